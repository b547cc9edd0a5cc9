//! End-to-end exercise of the frame envelope against a real in-memory byte
//! stream: several frames of different types, one deflated, written back to
//! back and read back in order (spec.md §8 invariant 2).

use xcdf::io::{ReadSource, WriteSink};

use xcdf::frame::{Frame, FrameBuffer, BLOCK_DATA, BLOCK_HEADER, FILE_HEADER, FILE_TRAILER};

#[test]
fn writes_and_reads_back_a_mixed_sequence_of_frames() {
    let mut sink = WriteSink::new(Vec::new());

    let mut header_payload = FrameBuffer::new();
    header_payload.put_string("header-ish payload");
    Frame::new(FILE_HEADER, header_payload).write(&mut sink, false).unwrap();

    let mut block_header_payload = FrameBuffer::new();
    block_header_payload.put_u32(42);
    Frame::new(BLOCK_HEADER, block_header_payload).write(&mut sink, false).unwrap();

    // Large enough to be worth deflating and to exercise the compressed path.
    let mut block_data_payload = FrameBuffer::new();
    for i in 0..2000u32 {
        block_data_payload.put_u32(i);
    }
    Frame::new(BLOCK_DATA, block_data_payload).write(&mut sink, true).unwrap();

    let mut trailer_payload = FrameBuffer::new();
    trailer_payload.put_u64(7);
    Frame::new(FILE_TRAILER, trailer_payload).write(&mut sink, false).unwrap();

    let bytes = sink.into_inner();
    let mut source = ReadSource::new(std::io::Cursor::new(bytes));

    assert!(Frame::peek_next_exists(&mut source).unwrap());
    let f1 = Frame::read(&mut source).unwrap();
    assert_eq!(f1.frame_type, FILE_HEADER);

    let f2 = Frame::read(&mut source).unwrap();
    assert_eq!(f2.frame_type, BLOCK_HEADER);

    let mut f3 = Frame::read(&mut source).unwrap();
    assert_eq!(f3.frame_type, BLOCK_DATA);
    assert_eq!(f3.payload.get_u32().unwrap(), 0);
    assert_eq!(f3.payload.get_u32().unwrap(), 1);

    let mut f4 = Frame::read(&mut source).unwrap();
    assert_eq!(f4.frame_type, FILE_TRAILER);
    assert_eq!(f4.payload.get_u64().unwrap(), 7);

    assert!(!Frame::peek_next_exists(&mut source).unwrap());
}

#[test]
fn single_byte_payload_flip_is_detected() {
    let mut sink = WriteSink::new(Vec::new());
    let mut payload = FrameBuffer::new();
    payload.put_string("a payload long enough to flip a byte inside");
    Frame::new(BLOCK_DATA, payload).write(&mut sink, false).unwrap();
    let mut bytes = sink.into_inner();

    // Flip a byte squarely inside the payload, well past the 16-byte frame
    // header (type+size+checksum).
    let flip_at = 20;
    bytes[flip_at] ^= 0x01;

    let mut source = ReadSource::new(std::io::Cursor::new(bytes));
    let err = Frame::read(&mut source).unwrap_err();
    assert!(matches!(err.kind(), xcdf::ErrorKind::ChecksumMismatch { .. }));
}
