//! C declarations for generated functions
//!
//! A benchmark harness includes this header, indexes the table and calls the
//! generated functions with an iteration count. Every table entry has the
//! declared `int (int)` signature; empty slots hold `NULL`.

use super::common::AsmWriter;

/// A C header declaring functions and a table of pointers to them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionTable {
    /// Include guard macro
    pub guard: String,
    /// Macro holding the table length
    pub count_macro: String,
    /// Function pointer typedef name
    pub typedef_name: String,
    /// Table variable name
    pub table_name: String,
    /// Slots in index order; `None` becomes `NULL`
    pub entries: Vec<Option<String>>,
}

impl FunctionTable {
    pub fn new(
        guard: impl Into<String>,
        count_macro: impl Into<String>,
        typedef_name: impl Into<String>,
        table_name: impl Into<String>,
    ) -> Self {
        Self {
            guard: guard.into(),
            count_macro: count_macro.into(),
            typedef_name: typedef_name.into(),
            table_name: table_name.into(),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, symbol: impl Into<String>) {
        self.entries.push(Some(symbol.into()));
    }

    pub fn push_null(&mut self) {
        self.entries.push(None);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("#ifndef {}\n", self.guard));
        out.push_str(&format!("#define {}\n", self.guard));
        out.push_str("#include <stddef.h>\n");
        out.push_str(&format!("#define {} {}\n", self.count_macro, self.len()));
        out.push_str(&format!("typedef int (*{})(int x);\n", self.typedef_name));
        for symbol in self.entries.iter().flatten() {
            out.push_str(&format!("int {}(int x);\n", symbol));
        }

        out.push_str(&format!(
            "static const {} {}[{}] = {{\n",
            self.typedef_name, self.table_name, self.count_macro
        ));
        let mut body = AsmWriter::new();
        for (i, entry) in self.entries.iter().enumerate() {
            let name = entry.as_deref().unwrap_or("NULL");
            let sep = if i + 1 == self.len() { "" } else { "," };
            body.statement(&format!("{}{}", name, sep));
        }
        out.push_str(body.output());
        out.push_str("};\n");
        out.push_str("#endif\n");
        out
    }
}
