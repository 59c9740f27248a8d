use std::fmt;

use crate::v4l2_sys::*;

/// Control data type
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Type {
    Integer,
    Boolean,
    Menu,
    Button,
    Integer64,
    CtrlClass,
    String,
    Bitmask,
    IntegerMenu,

    Unknown(u32),
}

impl Type {
    /// Whether the control's values are listed through `VIDIOC_QUERYMENU`
    pub fn is_menu(self) -> bool {
        matches!(self, Type::Menu | Type::IntegerMenu)
    }
}

impl From<u32> for Type {
    fn from(repr: u32) -> Self {
        match repr {
            1 => Self::Integer,
            2 => Self::Boolean,
            3 => Self::Menu,
            4 => Self::Button,
            5 => Self::Integer64,
            6 => Self::CtrlClass,
            7 => Self::String,
            8 => Self::Bitmask,
            9 => Self::IntegerMenu,
            repr => Self::Unknown(repr),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

bitflags::bitflags! {
    #[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
    pub struct Flags: u32 {
        const DISABLED              = 0x0001;
        const GRABBED               = 0x0002;
        const READ_ONLY             = 0x0004;
        const UPDATE                = 0x0008;
        const INACTIVE              = 0x0010;
        const SLIDER                = 0x0020;
        const WRITE_ONLY            = 0x0040;
        const VOLATILE              = 0x0080;

        const NEXT_CTRL             = 0x80000000;
    }
}

impl From<u32> for Flags {
    fn from(flags: u32) -> Self {
        Self::from_bits_retain(flags)
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Device control menu item
pub enum MenuItem {
    Name(String),
    Value(i64),
}

impl fmt::Display for MenuItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MenuItem::Name(name) => write!(f, "{}", name),
            MenuItem::Value(value) => write!(f, "{}", value),
        }
    }
}

impl MenuItem {
    /// Reads the entry of a `VIDIOC_QUERYMENU` reply, `None` unless `typ` is a menu type
    pub fn from_query(typ: Type, menu: &v4l2_querymenu) -> Option<Self> {
        // Unsafe because of access to union __bindgen_anon_1, selected by the control type
        unsafe {
            match typ {
                Type::Menu => Some(MenuItem::Name(
                    String::from_utf8_lossy(&menu.__bindgen_anon_1.name)
                        .trim_matches(char::from(0))
                        .to_string(),
                )),
                Type::IntegerMenu => Some(MenuItem::Value(menu.__bindgen_anon_1.value)),
                _ => None,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Device control description
pub struct Description {
    /// Control identifier
    pub id: u32,
    /// Type of control
    pub typ: Type,
    /// Name of the control, intended for the user
    pub name: String,
    /// Minimum value, inclusive
    pub minimum: i64,
    /// Maximum value, inclusive
    pub maximum: i64,
    /// Step size
    pub step: u64,
    /// Default value
    pub default: i64,
    /// Control flags
    pub flags: Flags,

    /// Menu entries by index, for menu controls
    pub items: Vec<(u32, MenuItem)>,
}

impl From<v4l2_queryctrl> for Description {
    fn from(ctrl: v4l2_queryctrl) -> Self {
        Self {
            id: ctrl.id,
            typ: Type::from(ctrl.type_),
            name: String::from_utf8_lossy(&ctrl.name)
                .trim_matches(char::from(0))
                .to_string(),
            minimum: ctrl.minimum.into(),
            maximum: ctrl.maximum.into(),
            step: ctrl.step.max(0) as u64,
            default: ctrl.default_value.into(),
            flags: Flags::from(ctrl.flags),
            items: Vec::new(),
        }
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.typ)?;
        match self.typ {
            Type::Integer | Type::Integer64 => write!(
                f,
                ": {}..{} step {}, default {}",
                self.minimum, self.maximum, self.step, self.default
            )?,
            Type::Boolean => write!(f, ": default {}", self.default != 0)?,
            _ => {}
        }
        if !self.items.is_empty() {
            let items: Vec<String> = self
                .items
                .iter()
                .map(|(index, item)| format!("{}={}", index, item))
                .collect();
            write!(f, ": {}", items.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem;

    #[test]
    fn menu_entries() {
        let mut raw: v4l2_querymenu = unsafe { mem::zeroed() };
        unsafe { raw.__bindgen_anon_1.name[..6].copy_from_slice(b"50 Hz\0") };
        assert_eq!(
            MenuItem::from_query(Type::Menu, &raw),
            Some(MenuItem::Name("50 Hz".to_string()))
        );
        assert_eq!(MenuItem::from_query(Type::Integer, &raw), None);

        raw.__bindgen_anon_1.value = 24_000_000;
        assert_eq!(
            MenuItem::from_query(Type::IntegerMenu, &raw),
            Some(MenuItem::Value(24_000_000))
        );
    }

    #[test]
    fn describes_queryctrl() {
        let mut raw: v4l2_queryctrl = unsafe { mem::zeroed() };
        raw.id = 0x0098_0900;
        raw.type_ = 1;
        raw.name[..10].copy_from_slice(b"Brightness");
        raw.minimum = -64;
        raw.maximum = 64;
        raw.step = 1;
        raw.flags = Flags::SLIDER.bits();

        let desc = Description::from(raw);
        assert_eq!(desc.typ, Type::Integer);
        assert!(desc.flags.contains(Flags::SLIDER));
        assert_eq!(
            desc.to_string(),
            "Brightness (Integer): -64..64 step 1, default 0"
        );
    }
}
