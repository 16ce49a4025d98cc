//! Socket actions: one function per remote operation.
//!
//! Each function builds a [`Command`] and hands it to the transport, then
//! returns. Completion is observed later as an inbound event routed to the
//! command's dispatch target. Parameters are passed through unchecked.
//!
//! Most commands only carry their wait token; the transport registers it
//! when the request is written and clears it when the reply arrives. Pause,
//! resume, cancel, power toggles and gcode scripts with a wait register the
//! wait here, before submission, so a second click is refused immediately.

use serde_json::{Map, Value, json};

use crate::command::{ChannelTransport, Command, DispatchTarget, Transport};
use crate::waits::{self, WaitRegistry};

#[derive(Debug, Clone)]
pub struct SocketActions<T: Transport = ChannelTransport> {
    transport: T,
    waits: WaitRegistry,
}

/// `{ "<device>": null }`, the shape Moonraker's power API expects.
fn device_params(device: &str) -> Value {
    let mut params = Map::new();
    params.insert(device.to_string(), Value::Null);
    Value::Object(params)
}

impl<T: Transport> SocketActions<T> {
    pub fn new(transport: T, waits: WaitRegistry) -> Self {
        Self { transport, waits }
    }

    pub fn waits(&self) -> &WaitRegistry {
        &self.waits
    }

    fn emit(&self, command: Command) {
        self.transport.emit(command);
    }

    pub fn machine_services_restart(&self, service: &str) {
        self.emit(
            Command::new("machine.services.restart", DispatchTarget::Void)
                .with_params(json!({ "service": service }))
                .with_wait(Some(waits::ON_SERVICE_RESTART)),
        );
    }

    pub fn machine_reboot(&self) {
        self.emit(Command::new("machine.reboot", DispatchTarget::Void));
    }

    pub fn machine_shutdown(&self) {
        self.emit(Command::new("machine.shutdown", DispatchTarget::Void));
    }

    pub fn machine_update_status(&self, refresh: bool) {
        self.emit(
            Command::new("machine.update.status", DispatchTarget::VersionOnUpdateStatus)
                .with_params(json!({ "refresh": refresh }))
                .with_wait(Some(waits::ON_FORCE_UPDATE_CHECK)),
        );
    }

    pub fn machine_update_moonraker(&self) {
        self.emit(
            Command::new(
                "machine.update.moonraker",
                DispatchTarget::VersionOnUpdatedMoonraker,
            )
            .with_wait(Some(waits::ON_UPDATE)),
        );
    }

    pub fn machine_update_klipper(&self) {
        self.emit(
            Command::new("machine.update.klipper", DispatchTarget::VersionOnUpdatedKlipper)
                .with_params(json!({ "include_deps": true }))
                .with_wait(Some(waits::ON_UPDATE)),
        );
    }

    pub fn machine_update_client(&self) {
        self.emit(
            Command::new("machine.update.client", DispatchTarget::VersionOnUpdatedClient)
                .with_wait(Some(waits::ON_UPDATE)),
        );
    }

    pub fn machine_update_system(&self) {
        self.emit(
            Command::new("machine.update.system", DispatchTarget::VersionOnUpdatedSystem)
                .with_wait(Some(waits::ON_UPDATE)),
        );
    }

    pub fn machine_device_power_devices(&self) {
        self.emit(Command::new(
            "machine.device_power.devices",
            DispatchTarget::DevicePowerInit,
        ));
    }

    pub fn machine_device_power_status(&self, device: &str) {
        self.emit(
            Command::new(
                "machine.device_power.status",
                DispatchTarget::DevicePowerOnStatus,
            )
            .with_params(device_params(device)),
        );
    }

    /// Switch `device` on when `state` is `"on"`, off for anything else.
    pub fn machine_device_power_toggle(&self, device: &str, state: &str, wait: Option<&str>) {
        let method = if state == "on" {
            "machine.device_power.on"
        } else {
            "machine.device_power.off"
        };
        if let Some(wait) = wait {
            self.waits.add(wait);
        }
        self.emit(
            Command::new(method, DispatchTarget::DevicePowerOnToggle)
                .with_params(device_params(device))
                .with_wait(wait),
        );
    }

    pub fn printer_info(&self) {
        self.emit(Command::new("printer.info", DispatchTarget::SocketOnPrinterInfo));
    }

    pub fn printer_restart(&self) {
        self.emit(
            Command::new("printer.restart", DispatchTarget::Void)
                .with_wait(Some(waits::ON_KLIPPER_RESTART)),
        );
    }

    pub fn printer_firmware_restart(&self) {
        self.emit(
            Command::new("printer.firmware_restart", DispatchTarget::Void)
                .with_wait(Some(waits::ON_KLIPPER_FIRMWARE_RESTART)),
        );
    }

    pub fn printer_query_endstops(&self) {
        self.emit(Command::new(
            "printer.query_endstops.status",
            DispatchTarget::SocketOnQueryEndstops,
        ));
    }

    pub fn printer_objects_list(&self) {
        self.emit(Command::new(
            "printer.objects.list",
            DispatchTarget::SocketOnPrinterObjectsList,
        ));
    }

    /// Subscribe to every field of each named object.
    pub fn printer_objects_subscribe<I, S>(&self, objects: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let objects: Map<String, Value> = objects
            .into_iter()
            .map(|name| (name.into(), Value::Null))
            .collect();
        self.emit(
            Command::new(
                "printer.objects.subscribe",
                DispatchTarget::SocketOnPrinterObjectsSubscribe,
            )
            .with_params(json!({ "objects": objects })),
        );
    }

    pub fn printer_print_start(&self, path: &str) {
        self.emit(
            Command::new("printer.print.start", DispatchTarget::Void)
                .with_params(json!({ "filename": path })),
        );
    }

    pub fn printer_print_cancel(&self) {
        self.waits.add(waits::ON_PRINT_CANCEL);
        self.emit(
            Command::new("printer.print.cancel", DispatchTarget::SocketOnPrintCancel)
                .with_wait(Some(waits::ON_PRINT_CANCEL)),
        );
    }

    pub fn printer_print_pause(&self) {
        self.waits.add(waits::ON_PRINT_PAUSE);
        self.emit(
            Command::new("printer.print.pause", DispatchTarget::SocketOnPrintPause)
                .with_wait(Some(waits::ON_PRINT_PAUSE)),
        );
    }

    pub fn printer_print_resume(&self) {
        self.waits.add(waits::ON_PRINT_RESUME);
        self.emit(
            Command::new("printer.print.resume", DispatchTarget::SocketOnPrintResume)
                .with_wait(Some(waits::ON_PRINT_RESUME)),
        );
    }

    pub fn printer_gcode_script(&self, gcode: &str, wait: Option<&str>) {
        if let Some(wait) = wait {
            self.waits.add(wait);
        }
        self.emit(
            Command::new("printer.gcode.script", DispatchTarget::SocketOnGcodeScript)
                .with_params(json!({ "script": gcode }))
                .with_wait(wait),
        );
    }

    pub fn printer_emergency_stop(&self) {
        self.emit(Command::new(
            "printer.emergency_stop",
            DispatchTarget::SocketNotifyKlippyDisconnected,
        ));
    }

    pub fn server_info(&self) {
        self.emit(Command::new("server.info", DispatchTarget::SocketOnServerInfo));
    }

    pub fn server_restart(&self) {
        self.emit(Command::new("server.restart", DispatchTarget::Void));
    }

    pub fn server_temperature_store(&self) {
        self.emit(Command::new(
            "server.temperature_store",
            DispatchTarget::SocketOnTemperatureStore,
        ));
    }

    pub fn server_gcode_store(&self) {
        self.emit(Command::new(
            "server.gcode_store",
            DispatchTarget::SocketOnGcodeStore,
        ));
    }

    /// Load metadata for a file. Expects the full path including root.
    pub fn server_files_metadata(&self, filepath: &str) {
        self.emit(
            Command::new("server.files.metadata", DispatchTarget::FilesOnFileUpdate)
                .with_params(json!({ "filename": filepath })),
        );
    }

    /// List a directory. Only `path` is required by the server; `root` is
    /// sent along so the reply can be filed under it.
    pub fn server_files_get_directory(&self, root: &str, path: &str) {
        self.emit(
            Command::new(
                "server.files.get_directory",
                DispatchTarget::FilesOnServerFilesGetDirectory,
            )
            .with_params(json!({ "root": root, "path": path, "extended": true }))
            .with_wait(Some(waits::get_directory(path))),
        );
    }

    pub fn server_files_move(&self, source: &str, dest: &str) {
        self.emit(
            Command::new("server.files.move", DispatchTarget::Void)
                .with_params(json!({ "source": source, "dest": dest })),
        );
    }

    /// Create a directory. Root should be included in the path.
    pub fn server_files_post_directory(&self, path: &str) {
        self.emit(
            Command::new("server.files.post_directory", DispatchTarget::Void)
                .with_params(json!({ "path": path })),
        );
    }

    pub fn server_files_delete_file(&self, path: &str) {
        self.emit(
            Command::new("server.files.delete_file", DispatchTarget::Void)
                .with_params(json!({ "path": path })),
        );
    }

    pub fn server_files_delete_directory(&self, path: &str) {
        self.emit(
            Command::new("server.files.delete_directory", DispatchTarget::Void)
                .with_params(json!({ "path": path, "force": false })),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn actions() -> (
        SocketActions<ChannelTransport>,
        mpsc::UnboundedReceiver<Command>,
        WaitRegistry,
    ) {
        let (transport, rx) = ChannelTransport::channel();
        let waits = WaitRegistry::new();
        (SocketActions::new(transport, waits.clone()), rx, waits)
    }

    #[test]
    fn test_services_restart_passes_wait_to_transport() {
        let (actions, mut rx, waits) = actions();
        actions.machine_services_restart("klipper");

        let command = rx.try_recv().unwrap();
        assert_eq!(command.method, "machine.services.restart");
        assert_eq!(command.dispatch, DispatchTarget::Void);
        assert_eq!(command.params, Some(json!({ "service": "klipper" })));
        assert_eq!(command.wait.as_deref(), Some(waits::ON_SERVICE_RESTART));
        assert!(!waits.has(waits::ON_SERVICE_RESTART));
    }

    #[test]
    fn test_print_pause_registers_wait_before_submission() {
        let (actions, mut rx, waits) = actions();
        actions.printer_print_pause();

        assert!(waits.has(waits::ON_PRINT_PAUSE));
        let command = rx.try_recv().unwrap();
        assert_eq!(command.method, "printer.print.pause");
        assert_eq!(command.dispatch, DispatchTarget::SocketOnPrintPause);
        assert_eq!(command.wait.as_deref(), Some(waits::ON_PRINT_PAUSE));
    }

    #[test]
    fn test_print_cancel_and_resume_register_waits() {
        let (actions, mut rx, waits) = actions();
        actions.printer_print_cancel();
        actions.printer_print_resume();

        assert!(waits.has(waits::ON_PRINT_CANCEL));
        assert!(waits.has(waits::ON_PRINT_RESUME));
        assert_eq!(rx.try_recv().unwrap().method, "printer.print.cancel");
        assert_eq!(rx.try_recv().unwrap().method, "printer.print.resume");
    }

    #[test]
    fn test_gcode_script_with_and_without_wait() {
        let (actions, mut rx, waits) = actions();
        actions.printer_gcode_script("G28", Some("homing"));
        actions.printer_gcode_script("M117 hi", None);

        assert!(waits.has("homing"));
        assert_eq!(waits.len(), 1);

        let first = rx.try_recv().unwrap();
        assert_eq!(first.params, Some(json!({ "script": "G28" })));
        assert_eq!(first.wait.as_deref(), Some("homing"));

        let second = rx.try_recv().unwrap();
        assert!(second.wait.is_none());
    }

    #[test]
    fn test_device_power_toggle() {
        let (actions, mut rx, waits) = actions();
        actions.machine_device_power_toggle("printer", "on", Some("powerPrinter"));
        actions.machine_device_power_toggle("lights", "off", None);

        assert!(waits.has("powerPrinter"));

        let on = rx.try_recv().unwrap();
        assert_eq!(on.method, "machine.device_power.on");
        assert_eq!(on.params, Some(json!({ "printer": null })));
        assert_eq!(on.dispatch, DispatchTarget::DevicePowerOnToggle);

        let off = rx.try_recv().unwrap();
        assert_eq!(off.method, "machine.device_power.off");
        assert_eq!(off.params, Some(json!({ "lights": null })));
    }

    #[test]
    fn test_klipper_update_includes_deps() {
        let (actions, mut rx, _) = actions();
        actions.machine_update_klipper();
        actions.machine_update_moonraker();

        let klipper = rx.try_recv().unwrap();
        assert_eq!(klipper.params, Some(json!({ "include_deps": true })));
        assert_eq!(klipper.wait.as_deref(), Some(waits::ON_UPDATE));

        let moonraker = rx.try_recv().unwrap();
        assert!(moonraker.params.is_none());
        assert_eq!(moonraker.dispatch, DispatchTarget::VersionOnUpdatedMoonraker);
    }

    #[test]
    fn test_get_directory_wait_is_per_path() {
        let (actions, mut rx, _) = actions();
        actions.server_files_get_directory("gcodes", "gcodes/parts");

        let command = rx.try_recv().unwrap();
        assert_eq!(
            command.params,
            Some(json!({ "root": "gcodes", "path": "gcodes/parts", "extended": true }))
        );
        assert_eq!(command.wait.as_deref(), Some("onGetDirectorygcodes/parts"));
    }

    #[test]
    fn test_objects_subscribe_params() {
        let (actions, mut rx, _) = actions();
        actions.printer_objects_subscribe(["toolhead", "heater_generic chamber"]);

        let command = rx.try_recv().unwrap();
        assert_eq!(
            command.params,
            Some(json!({ "objects": { "toolhead": null, "heater_generic chamber": null } }))
        );
    }

    #[test]
    fn test_file_operations() {
        let (actions, mut rx, _) = actions();
        actions.server_files_move("gcodes/a.gcode", "gcodes/old/a.gcode");
        actions.server_files_post_directory("gcodes/new");
        actions.server_files_delete_file("gcodes/a.gcode");
        actions.server_files_delete_directory("gcodes/old");
        actions.server_files_metadata("gcodes/b.gcode");

        let moved = rx.try_recv().unwrap();
        assert_eq!(
            moved.params,
            Some(json!({ "source": "gcodes/a.gcode", "dest": "gcodes/old/a.gcode" }))
        );
        assert_eq!(rx.try_recv().unwrap().method, "server.files.post_directory");
        assert_eq!(rx.try_recv().unwrap().method, "server.files.delete_file");

        let rmdir = rx.try_recv().unwrap();
        assert_eq!(rmdir.params, Some(json!({ "path": "gcodes/old", "force": false })));

        let metadata = rx.try_recv().unwrap();
        assert_eq!(metadata.dispatch, DispatchTarget::FilesOnFileUpdate);
        assert_eq!(metadata.params, Some(json!({ "filename": "gcodes/b.gcode" })));
    }

    #[test]
    fn test_fire_and_forget_commands() {
        let (actions, mut rx, waits) = actions();
        actions.machine_reboot();
        actions.machine_shutdown();
        actions.server_restart();
        actions.printer_print_start("gcodes/benchy.gcode");

        for method in [
            "machine.reboot",
            "machine.shutdown",
            "server.restart",
            "printer.print.start",
        ] {
            let command = rx.try_recv().unwrap();
            assert_eq!(command.method, method);
            assert!(command.dispatch.is_void());
        }
        assert!(!waits.has_any());
    }

    #[test]
    fn test_restart_waits() {
        let (actions, mut rx, _) = actions();
        actions.printer_restart();
        actions.printer_firmware_restart();
        assert_eq!(
            rx.try_recv().unwrap().wait.as_deref(),
            Some(waits::ON_KLIPPER_RESTART)
        );
        assert_eq!(
            rx.try_recv().unwrap().wait.as_deref(),
            Some(waits::ON_KLIPPER_FIRMWARE_RESTART)
        );
    }

    #[test]
    fn test_emergency_stop_routes_to_disconnect_handler() {
        let (actions, mut rx, _) = actions();
        actions.printer_emergency_stop();
        let command = rx.try_recv().unwrap();
        assert_eq!(command.dispatch, DispatchTarget::SocketNotifyKlippyDisconnected);
    }
}
