//! End-to-end bit-pack round-trip over a realistic mixed-width record
//! layout, exercising `BitBuffer` the way `BlockCodec` actually drives it:
//! many fields of varying widths packed back to back across many records
//! (spec.md §8 invariant 1).

use xcdf::block::BitBuffer;

#[test]
fn mixed_width_fields_round_trip_across_many_records() {
    // Simulates 3 fields per record with widths 5, 0 (all values equal to
    // active_min, so nothing to store), and 64 (passthrough), repeated for
    // 100 synthetic records.
    let widths = [5u8, 0u8, 64u8];
    let mut expected: Vec<u64> = Vec::new();
    let mut bb = BitBuffer::new();

    for i in 0..100u64 {
        let v0 = i % (1 << 5);
        let v1 = 0u64;
        let v2 = i.wrapping_mul(0x9E37_79B9);
        for (w, v) in widths.iter().zip([v0, v1, v2]) {
            bb.add(v, *w);
            expected.push(v);
        }
    }

    let bit_len = bb.bit_len();
    assert_eq!(bit_len as u64, 100 * widths.iter().map(|w| *w as u64).sum::<u64>());

    let bytes = bb.finish();
    let mut reader = BitBuffer::from_bytes(bytes);
    let mut got = Vec::new();
    for _ in 0..100 {
        for w in widths {
            got.push(reader.get(w));
        }
    }
    assert_eq!(got, expected);
}

#[test]
fn clear_and_reuse_resets_cursor_and_contents() {
    let mut bb = BitBuffer::new();
    bb.add(0xABCD, 16);
    assert_eq!(bb.bit_len(), 16);
    bb.clear();
    assert_eq!(bb.bit_len(), 0);
    bb.add(0x1234, 16);
    let bytes = bb.finish();
    let mut reader = BitBuffer::from_bytes(bytes);
    assert_eq!(reader.get(16), 0x1234);
}

#[test]
fn skip_then_get_lands_on_the_right_field() {
    // Mirrors how a reader would skip an uninteresting field before decoding
    // the next one, without re-reading it.
    let mut bb = BitBuffer::new();
    bb.add(111, 10);
    bb.add(222, 12);
    bb.add(333, 9);
    let bytes = bb.finish();

    let mut reader = BitBuffer::from_bytes(bytes);
    reader.skip(10);
    assert_eq!(reader.get(12), 222);
    assert_eq!(reader.get(9), 333);
}
