use std::cell::{Cell, RefCell};

use crate::registry::Setting;

#[derive(Debug, Default)]
pub struct StringSetting {
    value: RefCell<String>,
    max_len: Option<usize>,
}

impl StringSetting {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            value: RefCell::new(initial.into()),
            max_len: None,
        }
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = Some(max_len);
        self
    }

    pub fn get(&self) -> String {
        self.value.borrow().clone()
    }
}

impl Setting for StringSetting {
    fn get_raw(&self) -> String {
        self.get()
    }

    fn set_raw(&self, raw: &str) -> Result<(), String> {
        if let Some(max_len) = self.max_len {
            if raw.chars().count() > max_len {
                return Err(format!("value longer than {} characters", max_len));
            }
        }
        *self.value.borrow_mut() = raw.to_string();
        Ok(())
    }
}

#[derive(Debug)]
pub struct IntSetting {
    value: Cell<i64>,
    min: i64,
    max: i64,
}

impl IntSetting {
    pub fn new(initial: i64, min: i64, max: i64) -> Self {
        Self {
            value: Cell::new(initial.clamp(min, max)),
            min,
            max,
        }
    }

    pub fn get(&self) -> i64 {
        self.value.get()
    }
}

impl Setting for IntSetting {
    fn get_raw(&self) -> String {
        self.value.get().to_string()
    }

    fn set_raw(&self, raw: &str) -> Result<(), String> {
        let parsed: i64 = raw
            .trim()
            .parse()
            .map_err(|_| format!("\"{}\" is not an integer", raw))?;
        if parsed < self.min || parsed > self.max {
            return Err(format!(
                "{} is out of range [{}, {}]",
                parsed, self.min, self.max
            ));
        }
        self.value.set(parsed);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct BoolSetting {
    value: Cell<bool>,
}

impl BoolSetting {
    pub fn new(initial: bool) -> Self {
        Self {
            value: Cell::new(initial),
        }
    }

    pub fn get(&self) -> bool {
        self.value.get()
    }
}

impl Setting for BoolSetting {
    fn get_raw(&self) -> String {
        if self.value.get() { "1" } else { "0" }.to_string()
    }

    fn set_raw(&self, raw: &str) -> Result<(), String> {
        let parsed = match raw.trim() {
            "1" | "true" | "on" => true,
            "0" | "false" | "off" => false,
            other => return Err(format!("\"{}\" is not a boolean", other)),
        };
        self.value.set(parsed);
        Ok(())
    }
}

#[cfg(test)]
mod settings_tests {
    use super::*;

    #[test]
    fn int_setting_validates_range() {
        let setting = IntSetting::new(5, 0, 10);
        assert!(setting.set_raw("11").is_err());
        assert!(setting.set_raw("abc").is_err());
        setting.set_raw(" 7 ").expect("in range");
        assert_eq!(setting.get_raw(), "7");
    }

    #[test]
    fn bool_and_string_settings_round_trip_raw() {
        let flag = BoolSetting::new(false);
        flag.set_raw("on").expect("bool");
        assert_eq!(flag.get_raw(), "1");
        assert!(flag.set_raw("maybe").is_err());

        let name = StringSetting::new("player").with_max_len(4);
        assert!(name.set_raw("too long").is_err());
        name.set_raw("abc").expect("short name");
        assert_eq!(name.get(), "abc");
    }
}
