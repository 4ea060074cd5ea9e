//! Inbound command routing.
//!
//! Dispatch is keyed by the message's body name, then its `command` field:
//!
//! | Body name | Command | Mesh command | Echo |
//! |---|---|---|---|
//! | `zwave.cmd` | `inclusion` | `add_node(security)` | `zwave/manager` inclusion trigger |
//! | `zwave.cmd` | `exclusion` | `remove_node` | `zwave/manager` exclusion trigger |
//! | legacy | `setValue` on `prefix/n-c-i-x` | `set_value`, alias table bypassed | – |
//! | legacy | `status` / `enabled` | `set_value(0 or 1)` | – |
//! | legacy | `setValue` / `value` | `set_value(float)` | – |
//! | legacy | `target` | `set_value(percent → raw)` | target trigger |
//!
//! Everything else is expected noise on a shared bus and is ignored.

use serde_json::Value;
use zwxpl_types::{BridgeError, BusMessage, MeshCommand, StatusBody, ZValue};

use crate::coerce::{as_number, coerce_literal, is_true, number_value};
use crate::emulation::{PERCENT_UNITS, percent_to_raw};
use crate::resolver::{AddressResolver, parse_raw_literal};

/// Body name of controller-level commands.
pub const MANAGER_BODY: &str = "zwave.cmd";
/// Device name used when echoing controller-level commands.
pub const MANAGER_DEVICE: &str = "zwave/manager";
/// Body names of the device command vocabulary.
pub const LEGACY_BODIES: &[&str] = &["delabarre.command", "x10.basic"];

/// A mesh command plus the optional trigger echoed on the bus once it has
/// been issued.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedCommand {
    pub command: MeshCommand,
    pub echo: Option<StatusBody>,
}

/// Map an inbound bus message to a mesh command.
///
/// Returns `Ok(None)` for messages the bridge does not handle.
///
/// # Errors
///
/// * [`BridgeError::UnknownDevice`] when the device resolves neither as given
///   nor with `/command` appended.
/// * [`BridgeError::InvalidValue`] when `current` cannot be read for the
///   requested command.
pub fn route(
    message: &BusMessage,
    resolver: &AddressResolver,
) -> Result<Option<RoutedCommand>, BridgeError> {
    if message.body_name == MANAGER_BODY {
        return Ok(route_manager(message));
    }
    if LEGACY_BODIES.contains(&message.body_name.as_str()) {
        return route_device(message, resolver);
    }
    Ok(None)
}

fn route_manager(message: &BusMessage) -> Option<RoutedCommand> {
    match message.text("command")?.as_str() {
        "inclusion" => {
            let secure = is_true(message.field("security"));
            Some(RoutedCommand {
                command: MeshCommand::AddNode { secure },
                echo: Some(
                    StatusBody::new(MANAGER_DEVICE)
                        .kind("inclusion")
                        .security(secure),
                ),
            })
        }
        "exclusion" => Some(RoutedCommand {
            command: MeshCommand::RemoveNode,
            echo: Some(StatusBody::new(MANAGER_DEVICE).kind("exclusion")),
        }),
        _ => None,
    }
}

fn route_device(
    message: &BusMessage,
    resolver: &AddressResolver,
) -> Result<Option<RoutedCommand>, BridgeError> {
    let Some(command) = message.text("command") else {
        return Ok(None);
    };
    if !matches!(
        command.as_str(),
        "status" | "enabled" | "setValue" | "value" | "target"
    ) {
        return Ok(None);
    }
    let Some(device) = message.text("device").or_else(|| message.text("unit")) else {
        return Ok(None);
    };
    let current = message.field("current");

    if command == "setValue"
        && let Some(id) = parse_raw_literal(&device)
    {
        let value = current.ok_or_else(|| invalid(&device, current))?;
        return Ok(Some(RoutedCommand {
            command: MeshCommand::SetValue {
                id,
                value: coerce_literal(value),
            },
            echo: None,
        }));
    }

    let (external_id, target) = resolver
        .reverse(&device, &command)
        .ok_or_else(|| BridgeError::UnknownDevice(device.clone()))?;
    let id = target.value_id();

    let routed = match command.as_str() {
        "status" | "enabled" => RoutedCommand {
            command: MeshCommand::SetValue {
                id,
                value: ZValue::Int(i64::from(is_true(current))),
            },
            echo: None,
        },
        "setValue" | "value" => {
            let number = as_number(current).ok_or_else(|| invalid(&external_id, current))?;
            RoutedCommand {
                command: MeshCommand::SetValue {
                    id,
                    value: ZValue::Float(number),
                },
                echo: None,
            }
        }
        _ => {
            let percent = as_number(current)
                .ok_or_else(|| invalid(&external_id, current))?
                .clamp(0.0, 100.0);
            RoutedCommand {
                command: MeshCommand::SetValue {
                    id,
                    value: ZValue::Int(percent_to_raw(percent)),
                },
                echo: Some(
                    StatusBody::new(external_id)
                        .kind("target")
                        .current(number_value(percent))
                        .units(PERCENT_UNITS),
                ),
            }
        }
    };
    Ok(Some(routed))
}

fn invalid(device: &str, current: Option<&Value>) -> BridgeError {
    BridgeError::InvalidValue {
        device: device.to_string(),
        value: current.map_or_else(|| "<missing>".to_string(), Value::to_string),
    }
}
