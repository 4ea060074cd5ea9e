//! [`SchemaDump`] – semicolon-separated listing of discovered value points.
//!
//! One row is appended per value-added event so an operator can build an
//! alias table from what the mesh actually exposes.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use zwxpl_types::{BridgeError, MeshValue};

/// Header line written to a new or empty dump file.
pub const SCHEMA_HEADER: &str = "Body device;nodeId-classId-instance-index;type;genre;label;units;help;readOnly;write-only;min;max;value";

pub struct SchemaDump {
    path: PathBuf,
    out: BufWriter<File>,
}

impl SchemaDump {
    /// Open `path` for appending, writing the header when the file is new or
    /// empty.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Io`] if the file cannot be opened or written.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BridgeError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let is_empty = file.metadata()?.len() == 0;

        let mut dump = Self {
            path,
            out: BufWriter::new(file),
        };
        if is_empty {
            writeln!(dump.out, "{SCHEMA_HEADER}")?;
            dump.out.flush()?;
        }
        Ok(dump)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append the row for `value`, announced under `device`.
    pub fn append(&mut self, device: &str, value: &MeshValue) -> Result<(), BridgeError> {
        writeln!(self.out, "{}", row(device, value))?;
        self.out.flush()?;
        Ok(())
    }
}

/// Render one dump row.
pub fn row(device: &str, value: &MeshValue) -> String {
    let fields = [
        device.to_string(),
        value.id().to_string(),
        value.value_type.clone(),
        value.genre.clone(),
        value.label.clone(),
        value.units.clone(),
        value.help.clone(),
        value.read_only.to_string(),
        value.write_only.to_string(),
        value.min.to_string(),
        value.max.to_string(),
        value.value.to_string(),
    ];
    fields
        .iter()
        .map(|field| escape(field))
        .collect::<Vec<_>>()
        .join(";")
}

// Quote fields that would otherwise break the row.
fn escape(field: &str) -> String {
    if field.contains([';', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
