//! Control registry: typed view over the driver's control list.

use tracing::debug;

use crate::error::{CameraError, Result};
use crate::traits::{CameraDevice, ControlDescriptor, ControlKind};
use crate::value::Value;

/// One entry of a menu control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    /// Display name.
    pub name: String,
    /// Value written to select this entry.
    pub index: u32,
}

/// Integer range control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegerControl {
    /// Control id.
    pub id: u32,
    /// Control name.
    pub name: String,
    /// Minimum value.
    pub min: i64,
    /// Maximum value.
    pub max: i64,
    /// Step size.
    pub step: u64,
    /// Default value.
    pub default: i64,
}

/// Boolean control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BooleanControl {
    /// Control id.
    pub id: u32,
    /// Control name.
    pub name: String,
    /// Default value.
    pub default: bool,
}

/// Menu control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuControl {
    /// Control id.
    pub id: u32,
    /// Control name.
    pub name: String,
    /// Entries in driver order.
    pub items: Vec<MenuItem>,
    /// Index of the default entry.
    pub default: u32,
}

/// A hardware control exposed by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    /// Integer range.
    Integer(IntegerControl),
    /// On/off switch.
    Boolean(BooleanControl),
    /// Menu of named entries.
    Menu(MenuControl),
}

impl Control {
    /// Control id.
    #[must_use]
    pub const fn id(&self) -> u32 {
        match self {
            Self::Integer(ctrl) => ctrl.id,
            Self::Boolean(ctrl) => ctrl.id,
            Self::Menu(ctrl) => ctrl.id,
        }
    }

    /// Control name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Integer(ctrl) => &ctrl.name,
            Self::Boolean(ctrl) => &ctrl.name,
            Self::Menu(ctrl) => &ctrl.name,
        }
    }

    /// Build from a driver record. Returns `None` for unsupported kinds.
    fn from_descriptor(desc: ControlDescriptor) -> Option<Self> {
        match desc.kind {
            ControlKind::Integer => Some(Self::Integer(IntegerControl {
                id: desc.id,
                name: desc.name,
                min: desc.minimum,
                max: desc.maximum,
                step: desc.step,
                default: desc.default,
            })),
            ControlKind::Boolean => Some(Self::Boolean(BooleanControl {
                id: desc.id,
                name: desc.name,
                default: desc.default != 0,
            })),
            ControlKind::Menu | ControlKind::IntegerMenu => {
                let default = u32::try_from(desc.default).ok()?;
                let items = desc
                    .items
                    .into_iter()
                    .map(|(index, name)| MenuItem { name, index })
                    .collect();
                Some(Self::Menu(MenuControl {
                    id: desc.id,
                    name: desc.name,
                    items,
                    default,
                }))
            }
            ControlKind::Other(kind) => {
                debug!(id = desc.id, name = %desc.name, %kind, "skipping unsupported control");
                None
            }
        }
    }

    /// Check `value` against this control and return the raw value to write.
    fn encode(&self, value: &Value) -> Result<i64> {
        let raw = value.to_control_value()?;

        match self {
            Self::Integer(ctrl) => {
                if let Value::Boolean(_) = value {
                    return Err(CameraError::TypeMismatch(format!(
                        "control {:?} takes an integer",
                        ctrl.name
                    )));
                }
                if raw < ctrl.min || raw > ctrl.max {
                    return Err(CameraError::OutOfRange(format!(
                        "{raw} is outside [{}, {}] for {:?}",
                        ctrl.min, ctrl.max, ctrl.name
                    )));
                }
            }
            Self::Boolean(ctrl) => {
                if !(0..=1).contains(&raw) {
                    return Err(CameraError::OutOfRange(format!(
                        "{raw} is not a boolean value for {:?}",
                        ctrl.name
                    )));
                }
            }
            Self::Menu(ctrl) => {
                if let Value::Boolean(_) = value {
                    return Err(CameraError::TypeMismatch(format!(
                        "control {:?} takes a menu index",
                        ctrl.name
                    )));
                }
                let valid = u32::try_from(raw)
                    .is_ok_and(|index| ctrl.items.iter().any(|item| item.index == index));
                if !valid {
                    return Err(CameraError::OutOfRange(format!(
                        "{raw} is not a menu index of {:?}",
                        ctrl.name
                    )));
                }
            }
        }

        Ok(raw)
    }

    /// Interpret a raw driver value according to this control's kind.
    fn decode(&self, raw: i64) -> Result<ControlValue> {
        match self {
            Self::Integer(_) => Ok(ControlValue::Integer(raw)),
            Self::Boolean(_) => Ok(ControlValue::Boolean(raw != 0)),
            Self::Menu(ctrl) => u32::try_from(raw).map(ControlValue::Menu).map_err(|_| {
                CameraError::Device(format!("driver reported menu index {raw} for {:?}", ctrl.name))
            }),
        }
    }
}

/// Current value of a control, typed by the control's kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlValue {
    /// Integer control value.
    Integer(i64),
    /// Boolean control value.
    Boolean(bool),
    /// Selected menu index.
    Menu(u32),
}

/// Registry of the controls a device exposes.
///
/// Descriptors are enumerated once on first use; values are always read
/// from and written to the device directly.
#[derive(Debug, Default)]
pub struct ControlRegistry {
    controls: Option<Vec<Control>>,
}

impl ControlRegistry {
    /// Create an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self { controls: None }
    }

    /// All supported controls in driver order.
    pub fn controls<D: CameraDevice>(&mut self, device: &D) -> Result<&[Control]> {
        if self.controls.is_none() {
            let controls: Vec<Control> = device
                .query_controls()?
                .into_iter()
                .filter_map(Control::from_descriptor)
                .collect();
            debug!(count = controls.len(), "enumerated controls");
            self.controls = Some(controls);
        }

        Ok(self.controls.as_deref().unwrap_or_default())
    }

    fn find<D: CameraDevice>(&mut self, device: &D, id: u32) -> Result<Control> {
        self.controls(device)?
            .iter()
            .find(|ctrl| ctrl.id() == id)
            .cloned()
            .ok_or_else(|| CameraError::InvalidArgument(format!("unknown control id {id:#x}")))
    }

    /// Read a control's current value.
    pub fn get<D: CameraDevice>(&mut self, device: &D, id: u32) -> Result<ControlValue> {
        let ctrl = self.find(device, id)?;
        let raw = device.control(id)?;
        ctrl.decode(raw)
    }

    /// Write a control's value.
    pub fn set<D: CameraDevice>(&mut self, device: &mut D, id: u32, value: &Value) -> Result<()> {
        let ctrl = self.find(device, id)?;
        let raw = ctrl.encode(value)?;
        debug!(id, name = ctrl.name(), raw, "setting control");
        device.set_control(id, raw)
    }
}
