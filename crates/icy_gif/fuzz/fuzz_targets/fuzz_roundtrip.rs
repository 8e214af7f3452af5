#![no_main]

use arbitrary::Arbitrary;
use icy_gif::{EncoderOptions, Frame, GifEncoder};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    width: u8,
    height: u8,
    colors: u8,
    indices: Vec<u8>,
}

fuzz_target!(|input: FuzzInput| {
    let width = (input.width as usize).clamp(1, 64);
    let height = (input.height as usize).clamp(1, 64);
    let colors = (input.colors as usize).max(1);

    if input.indices.len() < width * height {
        return;
    }
    let indices: Vec<u8> = input.indices[..width * height]
        .iter()
        .map(|&i| (i as usize % colors) as u8)
        .collect();
    let palette: Vec<u8> = (0..colors * 3).map(|i| (i * 7) as u8).collect();

    let mut encoder = GifEncoder::new(width as u16, height as u16, &EncoderOptions::default())
        .expect("valid dimensions");
    encoder
        .add_frame(&Frame {
            indices: &indices,
            palette: &palette,
            delay_ms: 50,
            transparent_index: None,
        })
        .expect("valid frame");
    let bytes = encoder.finish();

    let mut opts = gif::DecodeOptions::new();
    opts.set_color_output(gif::ColorOutput::Indexed);
    let mut decoder = opts.read_info(bytes.as_slice()).expect("decodable header");
    let frame = decoder
        .read_next_frame()
        .expect("decodable frame")
        .expect("one frame");
    assert_eq!(frame.buffer.as_ref(), indices.as_slice());
    assert_eq!(frame.delay, 5);
});
