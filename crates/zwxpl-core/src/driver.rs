//! The two narrow seams the core talks through.
//!
//! [`MeshDriver`] is the write side of the mesh (connection lifecycle, polls,
//! value writes, inclusion/exclusion) and [`BusClient`] the outward side of
//! the pub/sub bus.  Both are fire-and-forget: the core never waits for a
//! confirmation, so neither method returns a result.

use zwxpl_types::{MeshCommand, StatusBody, ValueId, ZValue};

/// Commands the core issues to the mesh driver.
pub trait MeshDriver: Send {
    /// Open the controller on `serial_port`.
    fn connect(&mut self, serial_port: &str);

    /// Request an orderly close of the controller on `serial_port`.
    fn disconnect(&mut self, serial_port: &str);

    /// Ask the driver to actively poll `class_id` on `node_id`.
    fn enable_poll(&mut self, node_id: u8, class_id: u8, intensity: u8);

    /// Write `value` to a single value point.
    fn set_value(&mut self, id: ValueId, value: ZValue);

    /// Start inclusion mode; `secure` requests a secure inclusion.
    fn add_node(&mut self, secure: bool);

    /// Start exclusion mode.
    fn remove_node(&mut self);

    /// Dispatch a [`MeshCommand`] to the matching method.
    fn execute(&mut self, command: MeshCommand) {
        match command {
            MeshCommand::Connect { port, .. } => self.connect(&port),
            MeshCommand::Disconnect { port } => self.disconnect(&port),
            MeshCommand::EnablePoll {
                node_id,
                class_id,
                intensity,
            } => self.enable_poll(node_id, class_id, intensity),
            MeshCommand::SetValue { id, value } => self.set_value(id, value),
            MeshCommand::AddNode { secure } => self.add_node(secure),
            MeshCommand::RemoveNode => self.remove_node(),
        }
    }
}

/// Outward announcements on the bus.
pub trait BusClient: Send {
    /// Idempotent status announcement.
    fn send_stat(&mut self, body: StatusBody);

    /// State-change trigger announcement.
    fn send_trig(&mut self, body: StatusBody);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingDriver {
        calls: Vec<String>,
    }

    impl MeshDriver for RecordingDriver {
        fn connect(&mut self, serial_port: &str) {
            self.calls.push(format!("connect {serial_port}"));
        }
        fn disconnect(&mut self, serial_port: &str) {
            self.calls.push(format!("disconnect {serial_port}"));
        }
        fn enable_poll(&mut self, node_id: u8, class_id: u8, intensity: u8) {
            self.calls.push(format!("poll {node_id} {class_id} {intensity}"));
        }
        fn set_value(&mut self, id: ValueId, value: ZValue) {
            self.calls.push(format!("set {id} {value}"));
        }
        fn add_node(&mut self, secure: bool) {
            self.calls.push(format!("add {secure}"));
        }
        fn remove_node(&mut self) {
            self.calls.push("remove".to_string());
        }
    }

    #[test]
    fn execute_routes_each_command() {
        let mut driver = RecordingDriver::default();
        driver.execute(MeshCommand::SetValue {
            id: ValueId::new(9, 112, 1, 52),
            value: ZValue::Float(300.0),
        });
        driver.execute(MeshCommand::AddNode { secure: true });
        driver.execute(MeshCommand::RemoveNode);
        driver.execute(MeshCommand::EnablePoll {
            node_id: 5,
            class_id: 38,
            intensity: 2,
        });

        assert_eq!(
            driver.calls,
            vec!["set 9-112-1-52 300", "add true", "remove", "poll 5 38 2"]
        );
    }
}
