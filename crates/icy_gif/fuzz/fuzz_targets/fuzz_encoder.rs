#![no_main]

use arbitrary::Arbitrary;
use icy_gif::{quantize, EncoderOptions, Frame, GifEncoder, QuantizeOptions, Rgb};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    width: u8,
    height: u8,
    pixels: Vec<u8>,
    max_colors: u8,
    threshold: u8,
    dither: bool,
    preserve_alpha: bool,
    background: [u8; 3],
}

fuzz_target!(|input: FuzzInput| {
    let width = (input.width as usize).clamp(1, 128);
    let height = (input.height as usize).clamp(1, 128);

    let expected_size = width * height * 4;
    if input.pixels.len() < expected_size {
        return;
    }
    let pixels = &input.pixels[..expected_size];

    let opts = QuantizeOptions {
        max_colors: (input.max_colors as u16).max(2),
        preserve_alpha: input.preserve_alpha,
        transparent_threshold: input.threshold,
        dither: input.dither,
        background: Rgb::new(input.background[0], input.background[1], input.background[2]),
    };
    let q = quantize(pixels, width, height, &opts).expect("valid input must quantize");

    assert!((2..=256).contains(&q.palette.len()));
    assert!(q.indices.iter().all(|&i| (i as usize) < q.palette.len()));
    if let Some(t) = q.transparent_index {
        assert_eq!(t, 0);
    }

    let mut encoder = GifEncoder::new(width as u16, height as u16, &EncoderOptions::default())
        .expect("valid dimensions");
    encoder
        .add_frame(&Frame {
            indices: &q.indices,
            palette: &q.flat_palette(),
            delay_ms: 100,
            transparent_index: q.transparent_index,
        })
        .expect("quantized frame must encode");
    let _ = encoder.finish();
});
