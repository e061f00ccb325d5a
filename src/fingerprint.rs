//! Value-identity fingerprints for layer options.
//!
//! The computed cache keys entries by option *value*, not layer identity, so
//! two layers configured identically share one entry. Options are lowered to
//! their canonical JSON tree and hashed with two independently seeded FNV-1a
//! streams; a collision would need both 64-bit digests to agree.

use crate::plugins::LayerOptions;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OptionsFingerprint {
    pub hi: u64,
    pub lo: u64,
}

pub fn fingerprint_options(options: &LayerOptions) -> OptionsFingerprint {
    let mut a = Fnv1a64::new(0xcbf29ce484222325);
    let mut b = Fnv1a64::new(0x9ae16a3b2f90404f);

    match serde_json::to_value(options) {
        Ok(value) => write_value_pair(&mut a, &mut b, &value),
        // Non-finite floats refuse to serialize; bucket those options together.
        Err(_) => write_str_pair(&mut a, &mut b, "unserializable"),
    }

    OptionsFingerprint {
        hi: a.finish(),
        lo: b.finish(),
    }
}

fn write_value_pair(a: &mut Fnv1a64, b: &mut Fnv1a64, v: &serde_json::Value) {
    match v {
        serde_json::Value::Null => write_u8_pair(a, b, 0),
        serde_json::Value::Bool(x) => {
            write_u8_pair(a, b, 1);
            write_u8_pair(a, b, u8::from(*x));
        }
        serde_json::Value::Number(n) => {
            write_u8_pair(a, b, 2);
            write_str_pair(a, b, &n.to_string());
        }
        serde_json::Value::String(s) => {
            write_u8_pair(a, b, 3);
            write_str_pair(a, b, s);
        }
        serde_json::Value::Array(items) => {
            write_u8_pair(a, b, 4);
            write_u64_pair(a, b, items.len() as u64);
            for item in items {
                write_value_pair(a, b, item);
            }
        }
        serde_json::Value::Object(map) => {
            write_u8_pair(a, b, 5);
            write_u64_pair(a, b, map.len() as u64);
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                write_str_pair(a, b, key);
                write_value_pair(a, b, &map[key]);
            }
        }
    }
}

fn write_u8_pair(a: &mut Fnv1a64, b: &mut Fnv1a64, x: u8) {
    a.write(&[x]);
    b.write(&[x]);
}

fn write_u64_pair(a: &mut Fnv1a64, b: &mut Fnv1a64, x: u64) {
    a.write(&x.to_le_bytes());
    b.write(&x.to_le_bytes());
}

fn write_str_pair(a: &mut Fnv1a64, b: &mut Fnv1a64, s: &str) {
    write_u64_pair(a, b, s.len() as u64);
    a.write(s.as_bytes());
    b.write(s.as_bytes());
}

struct Fnv1a64 {
    state: u64,
}

impl Fnv1a64 {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.state ^= u64::from(byte);
            self.state = self.state.wrapping_mul(0x100000001b3);
        }
    }

    fn finish(&self) -> u64 {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::{FillOptions, ImageOptions, LayerOptions};
    use crate::surface::Color;

    #[test]
    fn equal_options_fingerprint_equal() {
        let a = LayerOptions::Fill(FillOptions {
            fill_style: Color::RED,
        });
        let b = LayerOptions::Fill(FillOptions {
            fill_style: Color::RED,
        });
        assert_eq!(fingerprint_options(&a), fingerprint_options(&b));
    }

    #[test]
    fn different_options_fingerprint_differently() {
        let a = LayerOptions::Image(ImageOptions {
            src: "a.png".to_string(),
        });
        let b = LayerOptions::Image(ImageOptions {
            src: "b.png".to_string(),
        });
        assert_ne!(fingerprint_options(&a), fingerprint_options(&b));
    }
}
