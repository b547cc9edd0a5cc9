//! Frame type tags (spec.md §4.2).

pub const FILE_HEADER: u32 = 0x436F_C8A4;
pub const BLOCK_HEADER: u32 = 0x160E_17E4;
pub const BLOCK_DATA: u32 = 0x37DF_239D;
pub const FILE_TRAILER: u32 = 0xBD34_0AF6;

/// Outer type tag marking a deflated frame; the real type follows as
/// `inner_type` inside the envelope.
pub const XCDF_DEFLATED: u32 = 0xD5F5_B1FA;

pub fn is_valid_frame_type(t: u32) -> bool {
    matches!(t, FILE_HEADER | BLOCK_HEADER | BLOCK_DATA | FILE_TRAILER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_distinct() {
        let all = [FILE_HEADER, BLOCK_HEADER, BLOCK_DATA, FILE_TRAILER, XCDF_DEFLATED];
        for (i, a) in all.iter().enumerate() {
            for (j, b) in all.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b);
                }
            }
        }
    }

    #[test]
    fn deflated_marker_is_not_a_valid_plain_type() {
        assert!(!is_valid_frame_type(XCDF_DEFLATED));
    }
}
