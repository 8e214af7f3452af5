//! Median-cut color quantizer.
//!
//! Colors are counted in a dense histogram with 5 significant bits per channel.
//! The occupied volume is then split recursively, most populous box first,
//! along its longest axis at the population median. Each surviving box
//! contributes its population-weighted average to the palette.
//!
//! This is Heckbert's median cut ("Color Image Quantization for Frame Buffer
//! Display", SIGGRAPH '82) working on histogram buckets instead of raw pixels.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::{GifError, Result, GIF_PALETTE_MAX};

const SIGBITS: u32 = 5;
const RSHIFT: u32 = 8 - SIGBITS;
const HISTO_SIZE: usize = 1 << (3 * SIGBITS);
const HALF_BUCKET: u32 = (1 << RSHIFT) / 2;

/// Floyd-Steinberg neighbours as (dx, dy, weight), in diffusion order.
const FLOYD_STEINBERG: [(isize, usize, f64); 4] = [
    (1, 0, 7.0 / 16.0),
    (-1, 1, 3.0 / 16.0),
    (0, 1, 5.0 / 16.0),
    (1, 1, 1.0 / 16.0),
];

/// Color type for palette entries (RGB).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    #[inline]
    fn distance_sq(self, r: f64, g: f64, b: f64) -> f64 {
        let dr = r - self.r as f64;
        let dg = g - self.g as f64;
        let db = b - self.b as f64;
        dr * dr + dg * dg + db * db
    }
}

/// Options for [`quantize`].
#[derive(Clone, Debug)]
pub struct QuantizeOptions {
    /// Maximum number of colors in the palette (2-256).
    /// One slot is taken by the transparent color when the frame has any.
    pub max_colors: u16,

    /// Treat pixels with alpha at or below `transparent_threshold` as transparent.
    pub preserve_alpha: bool,

    /// Alpha value at or below which a pixel counts as transparent.
    pub transparent_threshold: u8,

    /// Apply Floyd-Steinberg error diffusion while mapping pixels.
    pub dither: bool,

    /// Color stored in the reserved transparent slot, and the palette seed for
    /// frames without any opaque pixel.
    pub background: Rgb,
}

impl Default for QuantizeOptions {
    fn default() -> Self {
        Self {
            max_colors: 64,
            preserve_alpha: true,
            transparent_threshold: 16,
            dither: true,
            background: Rgb::BLACK,
        }
    }
}

/// A frame reduced to a palette and one palette index per pixel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuantizedFrame {
    /// Palette entries, 2 to 256 of them.
    pub palette: Vec<Rgb>,
    /// Row-major palette indices, one per source pixel.
    pub indices: Vec<u8>,
    /// Always `Some(0)` when the frame had transparent pixels.
    pub transparent_index: Option<u8>,
    /// Number of palette entries, including the transparent slot.
    pub color_count: usize,
}

impl QuantizedFrame {
    /// Palette as packed RGB triples, the layout a GIF color table uses.
    pub fn flat_palette(&self) -> Vec<u8> {
        self.palette.iter().flat_map(|c| [c.r, c.g, c.b]).collect()
    }
}

/// Reduce an RGBA image to at most `opts.max_colors` colors.
///
/// # Arguments
/// * `rgba` - Raw RGBA pixel data (4 bytes per pixel: R, G, B, A)
/// * `width` - Image width in pixels
/// * `height` - Image height in pixels
/// * `opts` - Quantization options
///
/// Frames with fewer distinct colors than requested simply get a smaller
/// palette; a single-color frame still gets two entries since GIF color
/// tables cannot be smaller than that.
pub fn quantize(
    rgba: &[u8],
    width: usize,
    height: usize,
    opts: &QuantizeOptions,
) -> Result<QuantizedFrame> {
    if width == 0 || height == 0 {
        return Err(GifError::InvalidDimensions { width, height });
    }
    let pixel_count = width
        .checked_mul(height)
        .ok_or(GifError::InvalidDimensions { width, height })?;
    let expected = pixel_count.saturating_mul(4);
    if rgba.len() != expected {
        return Err(GifError::BufferSizeMismatch {
            expected,
            actual: rgba.len(),
        });
    }

    let mut transparent = vec![false; pixel_count];
    let mut histo = Histogram::new();
    let mut bounds: Option<VBox> = None;
    let mut samples = 0usize;

    for (i, px) in rgba.chunks_exact(4).enumerate() {
        if opts.preserve_alpha && px[3] <= opts.transparent_threshold {
            transparent[i] = true;
            continue;
        }
        let (r, g, b) = (px[0] >> RSHIFT, px[1] >> RSHIFT, px[2] >> RSHIFT);
        histo.add(r, g, b);
        bounds = Some(match bounds {
            Some(vbox) => vbox.include(r, g, b),
            None => VBox::point(r, g, b),
        });
        samples += 1;
    }
    let has_transparent = samples < pixel_count;

    let effective_max = (opts.max_colors as usize).clamp(2, GIF_PALETTE_MAX);
    let target = (effective_max - usize::from(has_transparent))
        .min(samples)
        .max(1);

    let mut palette = match bounds {
        Some(vbox) => median_cut(&histo, vbox, target),
        None => Vec::new(),
    };
    if palette.is_empty() {
        palette.push(opts.background);
    }
    if palette.len() == 1 && samples > 1 {
        palette.push(palette[0]);
    }

    let transparent_index = if has_transparent {
        palette.insert(0, opts.background);
        Some(0u8)
    } else {
        None
    };

    while palette.len() < 2 {
        palette.push(palette[0]);
    }

    log::debug!(
        "quantized {}x{}: {} opaque / {} transparent pixels -> {} colors",
        width,
        height,
        samples,
        pixel_count - samples,
        palette.len()
    );

    let indices = if opts.dither {
        map_dithered(rgba, width, height, &palette, &transparent, transparent_index)
    } else {
        map_nearest(rgba, &palette, &transparent, transparent_index)
    };

    Ok(QuantizedFrame {
        color_count: palette.len(),
        palette,
        indices,
        transparent_index,
    })
}

fn map_nearest(
    rgba: &[u8],
    palette: &[Rgb],
    transparent: &[bool],
    transparent_index: Option<u8>,
) -> Vec<u8> {
    let fill = transparent_index.unwrap_or(0);
    rgba.chunks_exact(4)
        .zip(transparent)
        .map(|(px, &is_transparent)| {
            if is_transparent {
                fill
            } else {
                nearest(palette, px[0] as f64, px[1] as f64, px[2] as f64) as u8
            }
        })
        .collect()
}

fn map_dithered(
    rgba: &[u8],
    width: usize,
    height: usize,
    palette: &[Rgb],
    transparent: &[bool],
    transparent_index: Option<u8>,
) -> Vec<u8> {
    let fill = transparent_index.unwrap_or(0);

    // Working copy of the RGB channels that accumulates diffused error.
    let mut buffer: Vec<f32> = rgba
        .chunks_exact(4)
        .flat_map(|px| [px[0] as f32, px[1] as f32, px[2] as f32])
        .collect();
    let mut indices = vec![0u8; width * height];

    for y in 0..height {
        for x in 0..width {
            let pos = y * width + x;
            if transparent[pos] {
                indices[pos] = fill;
                continue;
            }
            let base = pos * 3;
            let (r, g, b) = (
                buffer[base] as f64,
                buffer[base + 1] as f64,
                buffer[base + 2] as f64,
            );
            let index = nearest(palette, r, g, b);
            indices[pos] = index as u8;

            let c = palette[index];
            let err = [r - c.r as f64, g - c.g as f64, b - c.b as f64];

            for &(dx, dy, weight) in &FLOYD_STEINBERG {
                let Some(nx) = x.checked_add_signed(dx) else {
                    continue;
                };
                let ny = y + dy;
                if nx >= width || ny >= height {
                    continue;
                }
                let npos = ny * width + nx;
                if transparent[npos] {
                    continue;
                }
                for (channel, e) in err.iter().enumerate() {
                    let v = &mut buffer[npos * 3 + channel];
                    *v = (*v as f64 + e * weight).clamp(0.0, 255.0) as f32;
                }
            }
        }
    }
    indices
}

/// Linear scan; ties go to the lowest index.
/// The transparent slot takes part like any other entry.
fn nearest(palette: &[Rgb], r: f64, g: f64, b: f64) -> usize {
    let mut best = 0;
    let mut min_dist = f64::INFINITY;
    for (i, c) in palette.iter().enumerate() {
        let dist = c.distance_sq(r, g, b);
        if dist < min_dist {
            min_dist = dist;
            best = i;
        }
    }
    best
}

#[inline]
fn color_key(r: u8, g: u8, b: u8) -> usize {
    ((r as usize) << (2 * SIGBITS)) | ((g as usize) << SIGBITS) | b as usize
}

/// Occurrence counts keyed by the packed 15-bit bucket color.
struct Histogram {
    counts: Vec<u32>,
}

impl Histogram {
    fn new() -> Self {
        Self {
            counts: vec![0; HISTO_SIZE],
        }
    }

    #[inline]
    fn add(&mut self, r: u8, g: u8, b: u8) {
        self.counts[color_key(r, g, b)] += 1;
    }

    #[inline]
    fn get(&self, r: u8, g: u8, b: u8) -> u32 {
        self.counts[color_key(r, g, b)]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Axis {
    Red,
    Green,
    Blue,
}

/// A non-empty histogram bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Cell {
    r: u8,
    g: u8,
    b: u8,
    count: u32,
}

impl Cell {
    #[inline]
    fn channel(&self, axis: Axis) -> u8 {
        match axis {
            Axis::Red => self.r,
            Axis::Green => self.g,
            Axis::Blue => self.b,
        }
    }
}

/// Inclusive bucket range `[r1,r2]x[g1,g2]x[b1,b2]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct VBox {
    r1: u8,
    r2: u8,
    g1: u8,
    g2: u8,
    b1: u8,
    b2: u8,
}

impl VBox {
    fn point(r: u8, g: u8, b: u8) -> Self {
        Self {
            r1: r,
            r2: r,
            g1: g,
            g2: g,
            b1: b,
            b2: b,
        }
    }

    fn include(self, r: u8, g: u8, b: u8) -> Self {
        Self {
            r1: self.r1.min(r),
            r2: self.r2.max(r),
            g1: self.g1.min(g),
            g2: self.g2.max(g),
            b1: self.b1.min(b),
            b2: self.b2.max(b),
        }
    }

    /// Tightest box around `cells`.
    fn bounding(cells: &[Cell]) -> Option<Self> {
        let (first, rest) = cells.split_first()?;
        Some(
            rest.iter()
                .fold(Self::point(first.r, first.g, first.b), |vbox, c| {
                    vbox.include(c.r, c.g, c.b)
                }),
        )
    }

    fn volume(&self) -> u32 {
        (self.r2 - self.r1 + 1) as u32
            * (self.g2 - self.g1 + 1) as u32
            * (self.b2 - self.b1 + 1) as u32
    }

    /// Non-empty buckets in r, g, b scan order.
    fn cells(&self, histo: &Histogram) -> Vec<Cell> {
        let mut cells = Vec::new();
        for r in self.r1..=self.r2 {
            for g in self.g1..=self.g2 {
                for b in self.b1..=self.b2 {
                    let count = histo.get(r, g, b);
                    if count > 0 {
                        cells.push(Cell { r, g, b, count });
                    }
                }
            }
        }
        cells
    }

    fn population(&self, histo: &Histogram) -> u64 {
        let mut total = 0u64;
        for r in self.r1..=self.r2 {
            for g in self.g1..=self.g2 {
                for b in self.b1..=self.b2 {
                    total += histo.get(r, g, b) as u64;
                }
            }
        }
        total
    }

    /// Population-weighted centroid, expanded back to 8 bits per channel.
    fn average(&self, histo: &Histogram) -> Rgb {
        let mut total = 0u64;
        let mut sums = [0u64; 3];
        for r in self.r1..=self.r2 {
            for g in self.g1..=self.g2 {
                for b in self.b1..=self.b2 {
                    let count = histo.get(r, g, b) as u64;
                    if count == 0 {
                        continue;
                    }
                    total += count;
                    sums[0] += count * expand(r);
                    sums[1] += count * expand(g);
                    sums[2] += count * expand(b);
                }
            }
        }
        if total == 0 {
            return Rgb::BLACK;
        }
        let round = |sum: u64| ((2 * sum + total) / (2 * total)) as u8;
        Rgb::new(round(sums[0]), round(sums[1]), round(sums[2]))
    }

    /// Ties favor red over green over blue.
    fn longest_axis(&self) -> Axis {
        let r = self.r2 - self.r1;
        let g = self.g2 - self.g1;
        let b = self.b2 - self.b1;
        if r >= g && r >= b {
            Axis::Red
        } else if g >= b {
            Axis::Green
        } else {
            Axis::Blue
        }
    }

    /// Split at the population median along the longest axis.
    ///
    /// Returns `None` for an empty box. The second box is `None` when the
    /// colors could not be separated.
    fn split(&self, histo: &Histogram) -> Option<(VBox, Option<VBox>)> {
        let axis = self.longest_axis();
        let mut cells = self.cells(histo);
        if cells.is_empty() {
            return None;
        }
        cells.sort_by_key(|c| c.channel(axis));

        let total: u64 = cells.iter().map(|c| c.count as u64).sum();
        let mut acc = 0u64;
        let mut split_at = cells.len() - 1;
        for (i, c) in cells.iter().enumerate() {
            acc += c.count as u64;
            if 2 * acc >= total {
                split_at = i;
                break;
            }
        }

        let (lower, upper) = if split_at + 1 < cells.len() {
            cells.split_at(split_at + 1)
        } else {
            // Everything landed on one side; bisect the sorted list instead.
            cells.split_at(cells.len() / 2)
        };

        match (VBox::bounding(lower), VBox::bounding(upper)) {
            (Some(a), b) => Some((a, b)),
            (None, Some(b)) => Some((b, None)),
            (None, None) => None,
        }
    }
}

#[inline]
fn expand(bucket: u8) -> u64 {
    (((bucket as u32) << RSHIFT) + HALF_BUCKET) as u64
}

/// Queue entry ordered by population, then by discovery order.
#[derive(Debug)]
struct Ranked {
    population: u64,
    seq: usize,
    vbox: VBox,
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.population
            .cmp(&other.population)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Max-priority worklist: the most populous box comes out first, and boxes
/// of equal population come out in the order they were pushed.
struct BoxQueue<'a> {
    histo: &'a Histogram,
    heap: BinaryHeap<Ranked>,
    next_seq: usize,
}

impl<'a> BoxQueue<'a> {
    fn new(histo: &'a Histogram) -> Self {
        Self {
            histo,
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    fn push(&mut self, vbox: VBox) {
        let population = vbox.population(self.histo);
        self.heap.push(Ranked {
            population,
            seq: self.next_seq,
            vbox,
        });
        self.next_seq += 1;
    }

    fn pop(&mut self) -> Option<Ranked> {
        self.heap.pop()
    }

    fn len(&self) -> usize {
        self.heap.len()
    }

    /// Remaining boxes in pop order.
    fn into_ordered(self) -> Vec<VBox> {
        let mut ranked = self.heap.into_sorted_vec();
        ranked.reverse();
        ranked.into_iter().map(|r| r.vbox).collect()
    }
}

fn median_cut(histo: &Histogram, initial: VBox, max_colors: usize) -> Vec<Rgb> {
    let mut queue = BoxQueue::new(histo);
    queue.push(initial);

    while queue.len() < max_colors {
        let Some(entry) = queue.pop() else {
            break;
        };
        if entry.population == 0 {
            break;
        }
        log::trace!(
            "splitting box of volume {} holding {} pixels",
            entry.vbox.volume(),
            entry.population
        );
        let Some((first, second)) = entry.vbox.split(histo) else {
            break;
        };
        queue.push(first);
        match second {
            Some(vbox) => queue.push(vbox),
            None => break,
        }
    }

    queue
        .into_ordered()
        .iter()
        .map(|vbox| vbox.average(histo))
        .collect()
}
