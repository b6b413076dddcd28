//! `HDC1` binary model layout
//!
//! ```text
//! offset 0:  4 bytes  magic "HDC1"
//! offset 4:  u32 LE   number of classes N
//! offset 8:  u32 LE   hv_dim
//! offset 12: u32 LE   input_dim
//! offset 16: u32 LE   levels
//! N times:   32 bytes class id, UTF-8, null-padded
//!            ceil(hv_dim/8) bytes prototype, MSB-first per byte
//! then:      input_dim x ceil(hv_dim/8) bytes basis vectors
//!            levels x ceil(hv_dim/8) bytes level vectors
//! ```
//!
//! Basis and level vectors are stored verbatim, so a loaded model never
//! depends on the generator that produced it. Loading parses and validates
//! the whole buffer before any encoder state is touched.

use crate::basis::HypervectorBasis;
use crate::config::EncoderConfig;
use crate::encoder::{ClassPrototype, HdcEncoder};
use crate::error::{IdentityError, Result};
use crate::hdc::BinaryHypervector;
use std::collections::HashSet;
use std::path::Path;

/// Magic bytes opening every model file
pub const MODEL_MAGIC: [u8; 4] = *b"HDC1";

/// Size of the fixed header
pub const HEADER_BYTES: usize = 20;

/// Fixed width of a stored class id
pub const CLASS_ID_BYTES: usize = 32;

/// Fixed-size header of a model file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelHeader {
    pub num_classes: usize,
    pub hv_dim: usize,
    pub input_dim: usize,
    pub levels: usize,
}

impl ModelHeader {
    /// Reads and checks the header at the start of `data`
    ///
    /// # Errors
    ///
    /// - `CorruptModel` if `data` is shorter than the header, the magic does
    ///   not match, or a dimension is zero.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_BYTES {
            return Err(IdentityError::CorruptModel(format!(
                "truncated header: {} of {} bytes",
                data.len(),
                HEADER_BYTES
            )));
        }
        if data[0..4] != MODEL_MAGIC {
            return Err(IdentityError::CorruptModel(format!(
                "bad magic {:02x?}",
                &data[0..4]
            )));
        }

        let field = |offset: usize| {
            u32::from_le_bytes([
                data[offset],
                data[offset + 1],
                data[offset + 2],
                data[offset + 3],
            ]) as usize
        };

        let header = Self {
            num_classes: field(4),
            hv_dim: field(8),
            input_dim: field(12),
            levels: field(16),
        };

        for (name, value) in [
            ("hv_dim", header.hv_dim),
            ("input_dim", header.input_dim),
            ("levels", header.levels),
        ] {
            if value == 0 {
                return Err(IdentityError::CorruptModel(format!("{} is zero", name)));
            }
        }

        Ok(header)
    }

    /// Packed bytes per stored vector
    pub fn bytes_per_vector(&self) -> usize {
        self.hv_dim.div_ceil(8)
    }

    /// Exact file size implied by the header, `None` on overflow
    pub fn expected_len(&self) -> Option<usize> {
        let per_vector = self.bytes_per_vector();
        let record = CLASS_ID_BYTES.checked_add(per_vector)?;
        let classes = self.num_classes.checked_mul(record)?;
        let vectors = self
            .input_dim
            .checked_add(self.levels)?
            .checked_mul(per_vector)?;

        HEADER_BYTES.checked_add(classes)?.checked_add(vectors)
    }

    fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(&MODEL_MAGIC);
        for (name, value) in [
            ("num_classes", self.num_classes),
            ("hv_dim", self.hv_dim),
            ("input_dim", self.input_dim),
            ("levels", self.levels),
        ] {
            let value = u32::try_from(value).map_err(|_| {
                IdentityError::Serialization(format!("{} {} does not fit in u32", name, value))
            })?;
            out.extend_from_slice(&value.to_le_bytes());
        }
        Ok(())
    }
}

/// Longest prefix of `id` that fits the class id field on a char boundary
pub fn truncate_class_id(id: &str) -> &str {
    if id.len() <= CLASS_ID_BYTES {
        return id;
    }

    let mut end = CLASS_ID_BYTES;
    while !id.is_char_boundary(end) {
        end -= 1;
    }
    &id[..end]
}

/// Class ids as stored on export, in prototype order
///
/// Ids longer than [`CLASS_ID_BYTES`] are truncated with a warning. Fails
/// with `Serialization` on NUL bytes or ids that collide once truncated.
pub(crate) fn stored_class_ids(encoder: &HdcEncoder) -> Result<Vec<&str>> {
    let mut seen = HashSet::with_capacity(encoder.num_classes());
    let mut ids = Vec::with_capacity(encoder.num_classes());

    for id in encoder.class_ids() {
        if id.contains('\0') {
            return Err(IdentityError::Serialization(format!(
                "class id {:?} contains NUL",
                id
            )));
        }

        let stored = truncate_class_id(id);
        if stored.len() < id.len() {
            tracing::warn!(
                class_id = %id,
                stored = %stored,
                "class id truncated to {} bytes",
                CLASS_ID_BYTES
            );
        }
        if !seen.insert(stored) {
            return Err(IdentityError::Serialization(format!(
                "class id {:?} collides with another id after truncation",
                id
            )));
        }
        ids.push(stored);
    }

    Ok(ids)
}

/// Serializes an encoder's prototypes, basis and levels
///
/// # Errors
///
/// `Serialization` when a class id contains NUL, two ids collide after
/// truncation, or a dimension exceeds `u32`.
pub fn encode_model(encoder: &HdcEncoder) -> Result<Vec<u8>> {
    let basis = encoder.basis();
    let header = ModelHeader {
        num_classes: encoder.num_classes(),
        hv_dim: basis.hv_dim(),
        input_dim: basis.input_dim(),
        levels: basis.num_levels(),
    };
    let capacity = header.expected_len().ok_or_else(|| {
        IdentityError::Serialization("model size overflows usize".to_string())
    })?;

    let mut out = Vec::with_capacity(capacity);
    header.write(&mut out)?;

    let ids = stored_class_ids(encoder)?;
    for (stored, prototype) in ids.iter().zip(encoder.prototypes()) {
        let mut field = [0u8; CLASS_ID_BYTES];
        field[..stored.len()].copy_from_slice(stored.as_bytes());
        out.extend_from_slice(&field);
        out.extend_from_slice(&prototype.vector.to_packed_bytes());
    }

    for vector in basis.basis_vectors().iter().chain(basis.level_vectors()) {
        out.extend_from_slice(&vector.to_packed_bytes());
    }

    Ok(out)
}

/// Fully validated contents of a model file
#[derive(Debug, Clone)]
pub struct DecodedModel {
    pub header: ModelHeader,
    pub prototypes: Vec<ClassPrototype>,
    pub basis: HypervectorBasis,
}

/// Parses a complete model buffer
///
/// # Errors
///
/// `CorruptModel` for a bad header, a size that disagrees with the header
/// (truncated or trailing bytes), an invalid class id or duplicate ids.
pub fn decode_model(data: &[u8]) -> Result<DecodedModel> {
    let header = ModelHeader::parse(data)?;
    let expected = header
        .expected_len()
        .ok_or_else(|| IdentityError::CorruptModel("declared size overflows".to_string()))?;

    if data.len() < expected {
        return Err(IdentityError::CorruptModel(format!(
            "truncated model: {} of {} bytes",
            data.len(),
            expected
        )));
    }
    if data.len() > expected {
        return Err(IdentityError::CorruptModel(format!(
            "{} trailing bytes after level vectors",
            data.len() - expected
        )));
    }

    let mut cursor = Cursor::new(&data[HEADER_BYTES..]);
    let per_vector = header.bytes_per_vector();

    let mut prototypes = Vec::with_capacity(header.num_classes);
    let mut seen = HashSet::with_capacity(header.num_classes);
    for index in 0..header.num_classes {
        let class_id = parse_class_id(cursor.take(CLASS_ID_BYTES)?, index)?;
        if !seen.insert(class_id.clone()) {
            return Err(IdentityError::CorruptModel(format!(
                "duplicate class id {:?}",
                class_id
            )));
        }

        let vector = BinaryHypervector::from_packed_bytes(header.hv_dim, cursor.take(per_vector)?)?;
        prototypes.push(ClassPrototype { class_id, vector });
    }

    let basis = (0..header.input_dim)
        .map(|_| BinaryHypervector::from_packed_bytes(header.hv_dim, cursor.take(per_vector)?))
        .collect::<Result<Vec<_>>>()?;
    let levels = (0..header.levels)
        .map(|_| BinaryHypervector::from_packed_bytes(header.hv_dim, cursor.take(per_vector)?))
        .collect::<Result<Vec<_>>>()?;

    Ok(DecodedModel {
        header,
        prototypes,
        basis: HypervectorBasis::from_parts(basis, levels)?,
    })
}

fn parse_class_id(field: &[u8], index: usize) -> Result<String> {
    let len = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    if field[len..].iter().any(|&b| b != 0) {
        return Err(IdentityError::CorruptModel(format!(
            "class {} id has bytes after its terminator",
            index
        )));
    }

    std::str::from_utf8(&field[..len])
        .map(str::to_owned)
        .map_err(|e| IdentityError::CorruptModel(format!("class {} id is not UTF-8: {}", index, e)))
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| IdentityError::CorruptModel("unexpected end of model".to_string()))?;

        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }
}

impl HdcEncoder {
    /// Serializes the encoder to the `HDC1` layout
    pub fn to_model_bytes(&self) -> Result<Vec<u8>> {
        encode_model(self)
    }

    /// Writes the `HDC1` layout to `path`
    pub fn save_model<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = self.to_model_bytes()?;
        std::fs::write(path.as_ref(), &bytes)?;

        tracing::info!(
            path = %path.as_ref().display(),
            classes = self.num_classes(),
            bytes = bytes.len(),
            "saved HDC model"
        );
        Ok(())
    }

    /// Builds a new encoder from model bytes
    ///
    /// Dimensions come from the file; value range and seed take their
    /// defaults since the layout does not record them.
    pub fn from_model_bytes(data: &[u8]) -> Result<Self> {
        let model = decode_model(data)?;
        let config = EncoderConfig::new(
            model.header.input_dim,
            model.header.hv_dim,
            model.header.levels,
        );
        config.validate()?;

        Ok(Self::from_parts(config, model.basis, model.prototypes))
    }

    /// Replaces basis, levels and prototypes with those in `data`
    ///
    /// The file's dimensions must equal this encoder's; on any error the
    /// encoder is left unchanged.
    pub fn restore_model_bytes(&mut self, data: &[u8]) -> Result<()> {
        let model = decode_model(data)?;

        for (field, expected, actual) in [
            ("hv_dim", self.hv_dim(), model.header.hv_dim),
            ("input_dim", self.input_dim(), model.header.input_dim),
            ("levels", self.levels(), model.header.levels),
        ] {
            if expected != actual {
                return Err(IdentityError::ModelMismatch {
                    field,
                    expected,
                    actual,
                });
            }
        }

        self.install(model.basis, model.prototypes);
        Ok(())
    }

    /// Reads `path` and restores this encoder from it
    pub fn load_model<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let bytes = std::fs::read(path.as_ref())?;
        self.restore_model_bytes(&bytes)?;

        tracing::info!(
            path = %path.as_ref().display(),
            classes = self.num_classes(),
            "loaded HDC model"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trained() -> HdcEncoder {
        let mut encoder = HdcEncoder::new(EncoderConfig::new(6, 100, 8)).unwrap();
        encoder
            .train(&[
                ("alice", vec![0.1f32, 0.2, -0.3, 1.0, 2.0, -2.0]),
                ("bob", vec![-1.0f32, 1.5, 0.0, 0.5, -0.5, 2.5]),
            ])
            .unwrap();
        encoder
    }

    #[test]
    fn test_layout_size_and_header() {
        let encoder = trained();
        let bytes = encoder.to_model_bytes().unwrap();

        // 100 bits pack into 13 bytes
        assert_eq!(bytes.len(), 20 + 2 * (32 + 13) + (6 + 8) * 13);
        assert_eq!(&bytes[0..4], b"HDC1");
        assert_eq!(&bytes[4..8], &2u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &100u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &6u32.to_le_bytes());
        assert_eq!(&bytes[16..20], &8u32.to_le_bytes());
        assert_eq!(&bytes[20..25], b"alice");
        assert!(bytes[25..52].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_prototype_bytes_are_msb_first() {
        let encoder = trained();
        let bytes = encoder.to_model_bytes().unwrap();
        let proto = encoder.prototype("alice").unwrap();

        let first = bytes[HEADER_BYTES + CLASS_ID_BYTES];
        for bit in 0..8 {
            assert_eq!(first & (0x80 >> bit) != 0, proto.get(bit));
        }
    }

    #[test]
    fn test_round_trip_bit_identical() {
        let encoder = trained();
        let bytes = encoder.to_model_bytes().unwrap();
        let loaded = HdcEncoder::from_model_bytes(&bytes).unwrap();

        assert_eq!(loaded.basis(), encoder.basis());
        assert_eq!(loaded.prototypes(), encoder.prototypes());
        assert_eq!(loaded.to_model_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_empty_encoder_round_trip() {
        let encoder = HdcEncoder::new(EncoderConfig::new(3, 64, 4)).unwrap();
        let bytes = encoder.to_model_bytes().unwrap();
        assert_eq!(bytes.len(), 20 + 7 * 8);

        let loaded = HdcEncoder::from_model_bytes(&bytes).unwrap();
        assert_eq!(loaded.num_classes(), 0);
        assert_eq!(loaded.basis(), encoder.basis());
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = trained().to_model_bytes().unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            HdcEncoder::from_model_bytes(&bytes),
            Err(IdentityError::CorruptModel(_))
        ));
    }

    #[test]
    fn test_truncated_and_trailing() {
        let bytes = trained().to_model_bytes().unwrap();

        for len in [0, 10, HEADER_BYTES, bytes.len() - 1] {
            assert!(matches!(
                decode_model(&bytes[..len]),
                Err(IdentityError::CorruptModel(_))
            ));
        }

        let mut longer = bytes.clone();
        longer.push(0);
        assert!(matches!(
            decode_model(&longer),
            Err(IdentityError::CorruptModel(_))
        ));
    }

    #[test]
    fn test_zero_dimension_header() {
        let mut bytes = trained().to_model_bytes().unwrap();
        bytes[8..12].copy_from_slice(&0u32.to_le_bytes());
        assert!(matches!(
            ModelHeader::parse(&bytes),
            Err(IdentityError::CorruptModel(_))
        ));
    }

    #[test]
    fn test_huge_class_count_is_corrupt() {
        let mut bytes = trained().to_model_bytes().unwrap();
        bytes[4..8].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            decode_model(&bytes),
            Err(IdentityError::CorruptModel(_))
        ));
    }

    #[test]
    fn test_invalid_class_id_bytes() {
        let bytes = trained().to_model_bytes().unwrap();

        let mut not_utf8 = bytes.clone();
        not_utf8[HEADER_BYTES] = 0xff;
        assert!(decode_model(&not_utf8).is_err());

        let mut gap = bytes.clone();
        gap[HEADER_BYTES + 10] = b'x';
        assert!(matches!(
            decode_model(&gap),
            Err(IdentityError::CorruptModel(_))
        ));
    }

    #[test]
    fn test_duplicate_ids_in_file() {
        let encoder = trained();
        let mut bytes = encoder.to_model_bytes().unwrap();
        let second = HEADER_BYTES + CLASS_ID_BYTES + 13;
        bytes[second..second + CLASS_ID_BYTES].fill(0);
        bytes[second..second + 5].copy_from_slice(b"alice");

        assert!(matches!(
            decode_model(&bytes),
            Err(IdentityError::CorruptModel(_))
        ));
    }

    #[test]
    fn test_truncate_class_id_on_char_boundary() {
        assert_eq!(truncate_class_id("short"), "short");

        let long = "a".repeat(40);
        assert_eq!(truncate_class_id(&long).len(), 32);

        // 31 ASCII bytes then a 2-byte char straddling the limit
        let straddle = format!("{}é", "a".repeat(31));
        assert_eq!(truncate_class_id(&straddle), "a".repeat(31));
    }

    #[test]
    fn test_long_id_truncated_on_export() {
        let mut encoder = HdcEncoder::new(EncoderConfig::new(2, 64, 4)).unwrap();
        let long = "x".repeat(40);
        encoder.train(&[(long.as_str(), vec![0.0f32, 1.0])]).unwrap();

        let loaded = HdcEncoder::from_model_bytes(&encoder.to_model_bytes().unwrap()).unwrap();
        let ids: Vec<_> = loaded.class_ids().collect();
        assert_eq!(ids, vec!["x".repeat(32)]);
    }

    #[test]
    fn test_colliding_ids_rejected_on_export() {
        let mut encoder = HdcEncoder::new(EncoderConfig::new(2, 64, 4)).unwrap();
        let a = format!("{}a", "x".repeat(32));
        let b = format!("{}b", "x".repeat(32));
        encoder
            .train(&[(a.as_str(), vec![0.0f32, 1.0]), (b.as_str(), vec![1.0f32, 0.0])])
            .unwrap();

        assert!(matches!(
            encoder.to_model_bytes(),
            Err(IdentityError::Serialization(_))
        ));
    }

    #[test]
    fn test_nul_in_id_rejected_on_export() {
        let mut encoder = HdcEncoder::new(EncoderConfig::new(2, 64, 4)).unwrap();
        encoder.train(&[("a\0b", vec![0.0f32, 1.0])]).unwrap();
        assert!(matches!(
            encoder.to_model_bytes(),
            Err(IdentityError::Serialization(_))
        ));
    }

    #[test]
    fn test_restore_checks_live_dimensions() {
        let bytes = trained().to_model_bytes().unwrap();

        let mut other = HdcEncoder::new(EncoderConfig::new(6, 128, 8)).unwrap();
        other.train(&[("carol", vec![0.0f32; 6])]).unwrap();
        let before = other.prototypes().to_vec();

        let result = other.restore_model_bytes(&bytes);
        assert!(matches!(
            result,
            Err(IdentityError::ModelMismatch {
                field: "hv_dim",
                expected: 128,
                actual: 100
            })
        ));
        assert_eq!(other.prototypes(), before.as_slice());
    }

    #[test]
    fn test_restore_keeps_live_range_and_seed() {
        let source = trained();
        let bytes = source.to_model_bytes().unwrap();

        let config = EncoderConfig::new(6, 100, 8)
            .with_value_range(-1.0, 1.0)
            .with_seed(9);
        let mut target = HdcEncoder::new(config.clone()).unwrap();
        target.restore_model_bytes(&bytes).unwrap();

        assert_eq!(target.config(), &config);
        assert_eq!(target.basis(), source.basis());
        assert_eq!(target.prototypes(), source.prototypes());
    }
}
