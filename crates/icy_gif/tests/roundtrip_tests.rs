//! Encode with icy_gif, decode with the `gif` crate.

use icy_gif::*;
use pretty_assertions::assert_eq;

struct Decoded {
    width: u16,
    height: u16,
    repeat: gif::Repeat,
    frames: Vec<gif::Frame<'static>>,
}

fn decode(bytes: &[u8], output: gif::ColorOutput) -> Decoded {
    let mut opts = gif::DecodeOptions::new();
    opts.set_color_output(output);
    let mut decoder = opts.read_info(bytes).expect("valid GIF header");
    let mut frames = Vec::new();
    while let Some(frame) = decoder.read_next_frame().expect("valid frame") {
        frames.push(frame.clone());
    }
    Decoded {
        width: decoder.width(),
        height: decoder.height(),
        repeat: decoder.repeat(),
        frames,
    }
}

fn decode_indexed(bytes: &[u8]) -> Decoded {
    decode(bytes, gif::ColorOutput::Indexed)
}

fn gradient(width: usize, height: usize) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(width * height * 4);
    for y in 0..height {
        for x in 0..width {
            rgba.push((x * 255 / (width - 1)) as u8);
            rgba.push((y * 255 / (height - 1)) as u8);
            rgba.push(128);
            rgba.push(255);
        }
    }
    rgba
}

fn encode_single(q: &QuantizedFrame, width: u16, height: u16, delay_ms: u32) -> Vec<u8> {
    let mut encoder = GifEncoder::new(width, height, &EncoderOptions::default()).unwrap();
    encoder
        .add_frame(&Frame {
            indices: &q.indices,
            palette: &q.flat_palette(),
            delay_ms,
            transparent_index: q.transparent_index,
        })
        .unwrap();
    encoder.finish()
}

#[test]
fn test_quantized_frame_survives_decoding() {
    let rgba = gradient(48, 32);
    let q = quantize(&rgba, 48, 32, &QuantizeOptions::default()).unwrap();
    let bytes = encode_single(&q, 48, 32, 100);

    let decoded = decode_indexed(&bytes);
    assert_eq!((decoded.width, decoded.height), (48, 32));
    assert_eq!(decoded.repeat, gif::Repeat::Infinite);
    assert_eq!(decoded.frames.len(), 1);

    let frame = &decoded.frames[0];
    assert_eq!(frame.buffer.as_ref(), q.indices.as_slice());
    assert_eq!(frame.delay, 10);
    assert_eq!(frame.dispose, gif::DisposalMethod::Any);
    assert_eq!(frame.transparent, None);

    let palette = frame.palette.as_ref().expect("local color table");
    let flat = q.flat_palette();
    assert_eq!(palette.len(), q.color_count.next_power_of_two() * 3);
    assert_eq!(&palette[..flat.len()], flat.as_slice());
    assert!(palette[flat.len()..].iter().all(|&b| b == 0));
}

#[test]
fn test_colors_stay_close_to_source() {
    let (width, height) = (64, 64);
    let rgba = gradient(width, height);
    let opts = QuantizeOptions {
        dither: false,
        ..Default::default()
    };
    let q = quantize(&rgba, width, height, &opts).unwrap();
    let bytes = encode_single(&q, width as u16, height as u16, 100);

    let decoded = decode(&bytes, gif::ColorOutput::RGBA);
    let pixels = &decoded.frames[0].buffer;
    assert_eq!(pixels.len(), rgba.len());
    for (src, out) in rgba.chunks_exact(4).zip(pixels.chunks_exact(4)) {
        for c in 0..3 {
            let diff = (src[c] as i32 - out[c] as i32).abs();
            assert!(diff <= 40, "channel {} off by {}: {:?} vs {:?}", c, diff, src, out);
        }
        assert_eq!(out[3], 255);
    }
}

#[test]
fn test_many_colors_large_frame() {
    // 300 distinct colors scattered over a frame large enough to fill the
    // LZW dictionary several times.
    let (width, height) = (200, 150);
    let mut rgba = Vec::with_capacity(width * height * 4);
    let mut seed = 0x2545_f491u32;
    for _ in 0..width * height {
        seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        let k = (seed >> 16) as usize % 300;
        rgba.extend_from_slice(&[
            (k % 256) as u8,
            (k / 256 * 200) as u8,
            (k * 13 % 256) as u8,
            255,
        ]);
    }
    let opts = QuantizeOptions {
        max_colors: 256,
        dither: false,
        ..Default::default()
    };
    let q = quantize(&rgba, width, height, &opts).unwrap();
    assert!(q.color_count > 128);

    let bytes = encode_single(&q, width as u16, height as u16, 50);
    let decoded = decode_indexed(&bytes);
    assert_eq!(decoded.frames[0].buffer.as_ref(), q.indices.as_slice());
}

#[test]
fn test_transparent_frames() {
    let (width, height) = (8usize, 8usize);
    let mut rgba = gradient(width, height);
    // punch a transparent hole in the middle
    for y in 2..6 {
        for x in 2..6 {
            rgba[(y * width + x) * 4 + 3] = 0;
        }
    }
    let q = quantize(&rgba, width, height, &QuantizeOptions::default()).unwrap();
    assert_eq!(q.transparent_index, Some(0));

    let bytes = encode_single(&q, width as u16, height as u16, 80);
    let decoded = decode_indexed(&bytes);
    let frame = &decoded.frames[0];
    assert_eq!(frame.transparent, Some(0));
    assert_eq!(frame.dispose, gif::DisposalMethod::Background);
    assert_eq!(frame.buffer.as_ref(), q.indices.as_slice());
    for y in 0..height {
        for x in 0..width {
            if (2..6).contains(&x) && (2..6).contains(&y) {
                assert_eq!(frame.buffer[y * width + x], 0, "pixel {},{}", x, y);
            }
        }
    }
}

#[test]
fn test_all_transparent_frame() {
    let rgba = vec![0u8; 5 * 4 * 4];
    let q = quantize(&rgba, 5, 4, &QuantizeOptions::default()).unwrap();
    assert_eq!(q.transparent_index, Some(0));
    assert!(q.indices.iter().all(|&i| i == 0));

    let decoded = decode_indexed(&encode_single(&q, 5, 4, 100));
    assert_eq!(decoded.frames[0].transparent, Some(0));
    assert!(decoded.frames[0].buffer.iter().all(|&i| i == 0));
}

#[test]
fn test_uniform_image() {
    let rgba = [10u8, 200, 30, 255].repeat(16);
    let q = quantize(&rgba, 4, 4, &QuantizeOptions::default()).unwrap();
    assert_eq!(q.color_count, 2);
    assert_eq!(q.palette[0], q.palette[1]);

    let decoded = decode(&encode_single(&q, 4, 4, 100), gif::ColorOutput::RGBA);
    for px in decoded.frames[0].buffer.chunks_exact(4) {
        let diff = |a: u8, b: u8| (a as i32 - b as i32).abs();
        assert!(diff(px[0], 10) <= 4 && diff(px[1], 200) <= 4 && diff(px[2], 30) <= 4);
    }
}

#[test]
fn test_frame_delays() {
    let rgba = [0, 0, 0, 255, 255, 255, 255, 255];
    let q = quantize(&rgba, 2, 1, &QuantizeOptions::default()).unwrap();
    let mut encoder = GifEncoder::new(2, 1, &EncoderOptions::default()).unwrap();
    for delay_ms in [0, 4, 5, 700, 10_000_000] {
        encoder
            .add_frame(&Frame {
                indices: &q.indices,
                palette: &q.flat_palette(),
                delay_ms,
                transparent_index: None,
            })
            .unwrap();
    }
    let decoded = decode_indexed(&encoder.finish());
    let delays: Vec<u16> = decoded.frames.iter().map(|f| f.delay).collect();
    assert_eq!(delays, vec![1, 1, 1, 70, 65535]);
}

#[test]
fn test_loop_count() {
    let q = quantize(&[0, 0, 0, 255], 1, 1, &QuantizeOptions::default()).unwrap();
    let opts = EncoderOptions {
        loop_count: Some(3),
    };
    let mut encoder = GifEncoder::new(1, 1, &opts).unwrap();
    encoder
        .add_frame(&Frame {
            indices: &q.indices,
            palette: &q.flat_palette(),
            delay_ms: 100,
            transparent_index: None,
        })
        .unwrap();
    assert_eq!(decode_indexed(&encoder.finish()).repeat, gif::Repeat::Finite(3));
}

#[test]
fn test_pipeline_animation() {
    let frames: Vec<SourceFrame> = (0..5)
        .map(|i| {
            let mut rgba = gradient(32, 24);
            for px in rgba.chunks_exact_mut(4) {
                px[2] = (i * 50) as u8;
            }
            SourceFrame::new(rgba, 32, 24, if i == 2 { None } else { Some(80) })
        })
        .collect();
    let settings = GifSettings {
        colors: 32,
        ..Default::default()
    };
    let output = build_gif(&mut VecSource::new(frames), &settings).unwrap();
    assert_eq!(output.frames, 5);
    assert_eq!((output.width, output.height), (32, 24));
    assert!(output.colors <= 32);

    let decoded = decode_indexed(&output.bytes);
    assert_eq!(decoded.frames.len(), 5);
    let delays: Vec<u16> = decoded.frames.iter().map(|f| f.delay).collect();
    assert_eq!(delays, vec![8, 8, 12, 8, 8]);
    for frame in &decoded.frames {
        assert_eq!((frame.width, frame.height), (32, 24));
        assert_eq!(frame.buffer.len(), 32 * 24);
    }
}

#[test]
fn test_output_is_deterministic() {
    let make = || {
        let frames = vec![
            SourceFrame::new(gradient(40, 30), 40, 30, Some(100)),
            SourceFrame::new(gradient(40, 30).into_iter().rev().collect(), 40, 30, Some(100)),
        ];
        build_gif(&mut VecSource::new(frames), &GifSettings::default()).unwrap()
    };
    assert_eq!(make().bytes, make().bytes);
}
