//! Generation of product configuration files in HCL syntax. Attribute and
//! block ordering is fixed, so identical inputs always produce identical
//! bytes.

use std::fmt::Write;

pub mod boundary;
pub mod consul;
pub mod nomad;
pub mod vault;

pub use boundary::BoundaryConfig;
pub use consul::ConsulConfig;
pub use nomad::NomadConfig;
pub use vault::VaultConfig;

/// Writes HCL attributes and nested blocks with two-space indentation.
pub(crate) struct HclWriter {
    out: String,
    indent: usize,
}

impl HclWriter {
    pub fn new() -> Self {
        Self {
            out: String::new(),
            indent: 0,
        }
    }

    /// A quoted string attribute: `key = "value"`.
    pub fn string(&mut self, key: &str, value: &str) {
        let _ = writeln!(
            self.out,
            "{}{} = \"{}\"",
            "  ".repeat(self.indent),
            key,
            value
        );
    }

    /// An unquoted attribute for booleans and integers: `key = value`.
    pub fn raw(&mut self, key: &str, value: impl std::fmt::Display) {
        let _ = writeln!(self.out, "{}{} = {}", "  ".repeat(self.indent), key, value);
    }

    /// A list of quoted strings: `key = ["a", "b"]`.
    pub fn string_list(&mut self, key: &str, values: &[String]) {
        let quoted: Vec<String> = values.iter().map(|v| format!("\"{v}\"")).collect();
        let _ = writeln!(
            self.out,
            "{}{} = [{}]",
            "  ".repeat(self.indent),
            key,
            quoted.join(", ")
        );
    }

    /// A nested block; `header` carries any labels, e.g. `listener "tcp"`.
    pub fn block(&mut self, header: &str, body: impl FnOnce(&mut Self)) {
        let _ = writeln!(self.out, "{}{} {{", "  ".repeat(self.indent), header);
        self.indent += 1;
        body(self);
        self.indent -= 1;
        let _ = writeln!(self.out, "{}}}", "  ".repeat(self.indent));
    }

    pub fn finish(self) -> String {
        self.out
    }
}
