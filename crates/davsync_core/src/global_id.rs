//! Global object identifiers of meeting items.
//!
//! Calendar items created by some legacy clients carry a binary global
//! object id (GOID) instead of, or as well as, a textual UID. A GOID that
//! wraps a textual UID has this layout:
//!
//! | Offset | Size | Content |
//! |---|---|---|
//! | 0 | 16 | class id prefix |
//! | 16 | 20 | instance date, creation time, reserved (zero) |
//! | 36 | 4 | data size, little-endian, `13 + uid.len()` |
//! | 40 | 8 | ASCII `vCal-Uid` |
//! | 48 | 4 | little-endian `1` |
//! | 52 | n | UID bytes |
//! | 52 + n | 1 | zero |

use uuid::{Uuid, Variant};

/// The 16-byte class id every GOID starts with.
pub const GOID_PREFIX: [u8; 16] = [
    0x04, 0x00, 0x00, 0x00, 0x82, 0x00, 0xE0, 0x00, 0x74, 0xC5, 0xB7, 0x10, 0x1A, 0x82, 0xE0, 0x08,
];

/// Longest UID that is wrapped into a GOID.
pub const MAX_ENCAPSULATED_UID: usize = 64;

const MARKER: &[u8] = b"vCal-Uid";
const ZERO_FIELDS: usize = 20;
// marker + version word + trailing zero
const DATA_OVERHEAD: usize = MARKER.len() + 4 + 1;

/// Wraps a textual UID into a GOID.
///
/// Returns `None` for UIDs longer than [`MAX_ENCAPSULATED_UID`] bytes.
pub fn encapsulate_uid(uid: &str) -> Option<Vec<u8>> {
    if uid.len() > MAX_ENCAPSULATED_UID {
        return None;
    }
    let size = u32::try_from(DATA_OVERHEAD + uid.len()).ok()?;

    let mut goid = Vec::with_capacity(GOID_PREFIX.len() + ZERO_FIELDS + 4 + size as usize);
    goid.extend_from_slice(&GOID_PREFIX);
    goid.extend_from_slice(&[0u8; ZERO_FIELDS]);
    goid.extend_from_slice(&size.to_le_bytes());
    goid.extend_from_slice(MARKER);
    goid.extend_from_slice(&1u32.to_le_bytes());
    goid.extend_from_slice(uid.as_bytes());
    goid.push(0);
    Some(goid)
}

/// Extracts the textual UID wrapped in a GOID.
///
/// The `vCal-Uid` marker is searched case-insensitively. Returns `None`
/// if the marker is missing, the size field is inconsistent with the
/// buffer, or the UID is not UTF-8.
pub fn extract_uid(goid: &[u8]) -> Option<String> {
    let marker = goid
        .windows(MARKER.len())
        .position(|w| w.eq_ignore_ascii_case(MARKER))?;
    let size_at = marker.checked_sub(4)?;
    let size_bytes: [u8; 4] = goid.get(size_at..marker)?.try_into().ok()?;
    let size = u32::from_le_bytes(size_bytes) as usize;

    let uid_len = size.checked_sub(DATA_OVERHEAD)?;
    let start = marker + MARKER.len() + 4;
    let uid = goid.get(start..start.checked_add(uid_len)?)?;
    String::from_utf8(uid.to_vec()).ok()
}

/// Returns true if `id` is the hex form of a GOID.
pub fn is_outlook_goid(id: &str) -> bool {
    let prefix = hex::encode_upper(GOID_PREFIX);
    id.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(&prefix))
}

/// Returns true if `id` is a hyphenated RFC 4122 UUID of version 1 to 5.
pub fn is_uuid(id: &str) -> bool {
    if id.len() != 36 {
        return false;
    }
    Uuid::parse_str(id).is_ok_and(|uuid| {
        (1..=5).contains(&uuid.get_version_num()) && uuid.get_variant() == Variant::RFC4122
    })
}
