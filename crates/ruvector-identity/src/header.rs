//! C header export for embedded targets
//!
//! Emits the model dimensions as preprocessor constants, the `User_t` and
//! `HDC_Model_t` structs, and optionally a `static const HDC_MODEL`
//! initializer. Vectors become `uint32_t` words built from the same
//! MSB-first bytes as the binary model, big-endian per word and
//! zero-padded, so the header alone can be flashed.

use crate::encoder::HdcEncoder;
use crate::error::{IdentityError, Result};
use crate::hdc::BinaryHypervector;
use crate::model::{stored_class_ids, CLASS_ID_BYTES};
use std::fmt::Write as _;
use std::path::Path;

/// `num_users` is a `uint8_t` in the generated struct
pub const MAX_HEADER_CLASSES: usize = u8::MAX as usize;

const WORDS_PER_LINE: usize = 8;

/// Renders the C header for a trained encoder
///
/// # Errors
///
/// - `NotTrained` if the encoder has no classes (C forbids empty arrays).
/// - `Serialization` if there are more than [`MAX_HEADER_CLASSES`] classes
///   or the class ids cannot be stored.
pub fn render_c_header(encoder: &HdcEncoder, with_data: bool) -> Result<String> {
    let num_users = encoder.num_classes();
    if num_users == 0 {
        return Err(IdentityError::NotTrained);
    }
    if num_users > MAX_HEADER_CLASSES {
        return Err(IdentityError::Serialization(format!(
            "{} classes exceed the header limit of {}",
            num_users, MAX_HEADER_CLASSES
        )));
    }
    let names = stored_class_ids(encoder)?;

    let hv_dim = encoder.hv_dim();
    let mut out = String::new();

    // Writing to a String cannot fail
    let _ = write!(
        out,
        "\
// Auto-generated HDC model header

#ifndef HDC_MODEL_H
#define HDC_MODEL_H

#include <stdint.h>

#define HV_DIM {hv_dim}
#define HV_DIM_BYTES {bytes}
#define HV_DIM_WORDS {words}
#define NUM_FEATURES {features}
#define NUM_LEVELS {levels}
#define NUM_USERS {num_users}

typedef struct {{
    char name[{name_len}];
    uint32_t prototype[HV_DIM_WORDS];
}} User_t;

typedef struct {{
    User_t users[NUM_USERS];
    uint32_t basis_hvs[NUM_FEATURES][HV_DIM_WORDS];
    uint32_t level_hvs[NUM_LEVELS][HV_DIM_WORDS];
    uint8_t num_users;
}} HDC_Model_t;
",
        hv_dim = hv_dim,
        bytes = hv_dim.div_ceil(8),
        words = hv_dim.div_ceil(32),
        features = encoder.input_dim(),
        levels = encoder.levels(),
        num_users = num_users,
        name_len = CLASS_ID_BYTES,
    );

    if with_data {
        out.push_str("\nstatic const HDC_Model_t HDC_MODEL = {\n    .users = {\n");
        for (name, prototype) in names.iter().zip(encoder.prototypes()) {
            let _ = writeln!(out, "        {{\n            \"{}\",", c_string_escape(name));
            write_words(&mut out, &prototype.vector, 12);
            out.push_str("        },\n");
        }
        out.push_str("    },\n");

        write_vector_table(&mut out, "basis_hvs", encoder.basis().basis_vectors());
        write_vector_table(&mut out, "level_hvs", encoder.basis().level_vectors());

        let _ = writeln!(out, "    .num_users = {},\n}};", num_users);
    }

    out.push_str("\n#endif // HDC_MODEL_H\n");
    Ok(out)
}

/// Writes the rendered header to `path`
pub fn export_c_header<P: AsRef<Path>>(encoder: &HdcEncoder, path: P, with_data: bool) -> Result<()> {
    let header = render_c_header(encoder, with_data)?;
    std::fs::write(path.as_ref(), header)?;

    tracing::info!(
        path = %path.as_ref().display(),
        classes = encoder.num_classes(),
        with_data,
        "exported C header"
    );
    Ok(())
}

fn write_vector_table(out: &mut String, field: &str, vectors: &[BinaryHypervector]) {
    let _ = writeln!(out, "    .{} = {{", field);
    for vector in vectors {
        write_words(out, vector, 8);
    }
    out.push_str("    },\n");
}

fn write_words(out: &mut String, vector: &BinaryHypervector, indent: usize) {
    let pad = " ".repeat(indent);
    let _ = writeln!(out, "{}{{", pad);
    for chunk in vector.to_words_u32().chunks(WORDS_PER_LINE) {
        out.push_str(&pad);
        out.push_str("   ");
        for word in chunk {
            let _ = write!(out, " 0x{:08X},", word);
        }
        out.push('\n');
    }
    let _ = writeln!(out, "{}}},", pad);
}

/// Escapes a class id for a C string literal
///
/// Printable ASCII passes through; everything else becomes a three-digit
/// octal escape so the following character can never extend it.
fn c_string_escape(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for byte in name.bytes() {
        match byte {
            b'"' => escaped.push_str("\\\""),
            b'\\' => escaped.push_str("\\\\"),
            b'?' => escaped.push_str("\\?"),
            0x20..=0x7e => escaped.push(byte as char),
            _ => {
                let _ = write!(escaped, "\\{:03o}", byte);
            }
        }
    }
    escaped
}

impl HdcEncoder {
    /// Renders the C header; see [`render_c_header`]
    pub fn to_c_header(&self, with_data: bool) -> Result<String> {
        render_c_header(self, with_data)
    }

    /// Writes the C header to `path`; see [`export_c_header`]
    pub fn export_c_header<P: AsRef<Path>>(&self, path: P, with_data: bool) -> Result<()> {
        export_c_header(self, path, with_data)
    }
}
