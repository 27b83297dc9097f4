use std::io::Cursor;

use anyhow::{Context, Result};
use image::{ImageFormat, RgbImage};
use log::debug;
use plotters::coord::Shift;
use plotters::prelude::*;

use crate::rank::RankedReport;

pub const DEFAULT_FONT: &str = "sans-serif";
pub const FONT_SIZE: u32 = 30;
pub const INTERLINE: u32 = FONT_SIZE / 3;
pub const WIDTH: u32 = 512;

const LINE_HEIGHT: u32 = FONT_SIZE + INTERLINE;
const USERNAME_X: i32 = INTERLINE as i32;
// Right edges of the numeric columns.
const DELTA_RIGHT: i32 = (WIDTH * 7 / 10) as i32;
const NOW_RIGHT: i32 = (WIDTH - INTERLINE) as i32;

type Canvas<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

/// Canvas dimensions for a report with `rows` accounts.
pub fn canvas_size(rows: usize) -> (u32, u32) {
    let lines = u32::try_from(rows).unwrap_or(u32::MAX).saturating_add(2);
    let height = lines
        .saturating_mul(LINE_HEIGHT)
        .saturating_add(2 * INTERLINE);
    (WIDTH, height)
}

fn draw_left(canvas: &Canvas, text: &str, style: &TextStyle, x: i32, y: i32) -> Result<()> {
    canvas.draw_text(text, style, (x, y))?;
    Ok(())
}

fn draw_right(canvas: &Canvas, text: &str, style: &TextStyle, right: i32, y: i32) -> Result<()> {
    if text.is_empty() {
        return Ok(());
    }
    let (width, _) = canvas.estimate_text_size(text, style)?;
    canvas.draw_text(text, style, (right - width as i32, y))?;
    Ok(())
}

/// Draw the ranking as a PNG table: username on the left, numbers
/// right-aligned against fixed column edges.
pub fn render_image(report: &RankedReport, font_family: &str) -> Result<Vec<u8>> {
    let (width, height) = canvas_size(report.len());
    let mut pixels = vec![0u8; width as usize * height as usize * 3];
    {
        let canvas = BitMapBackend::with_buffer(&mut pixels, (width, height)).into_drawing_area();
        canvas.fill(&WHITE)?;
        let style = (font_family, f64::from(FONT_SIZE))
            .into_font()
            .color(&BLACK);

        let mut line = INTERLINE as i32;
        draw_left(&canvas, "@username", &style, USERNAME_X, line)?;
        draw_right(&canvas, &report.delta_label, &style, DELTA_RIGHT, line)?;
        draw_right(&canvas, "now", &style, NOW_RIGHT, line)?;

        line += LINE_HEIGHT as i32;
        canvas.draw(&PathElement::new(
            vec![(USERNAME_X, line), (NOW_RIGHT, line)],
            BLACK.stroke_width(1),
        ))?;

        for account in &report.accounts {
            draw_left(&canvas, &account.username, &style, USERNAME_X, line)?;
            draw_right(&canvas, &account.delta_text(), &style, DELTA_RIGHT, line)?;
            draw_right(
                &canvas,
                &account.current_count.to_string(),
                &style,
                NOW_RIGHT,
                line,
            )?;
            line += LINE_HEIGHT as i32;
        }
        canvas.present()?;
    }

    let image = RgbImage::from_raw(width, height, pixels)
        .context("pixel buffer does not match canvas size")?;
    let mut png = Cursor::new(Vec::new());
    image.write_to(&mut png, ImageFormat::Png)?;
    debug!(
        "Rendered {} rows into a {width}x{height} PNG ({} bytes)",
        report.len(),
        png.get_ref().len()
    );
    Ok(png.into_inner())
}

#[cfg(test)]
mod tests {
    use std::ops::Range;

    use super::*;
    use crate::aggregate::AccountReport;
    use crate::rank::rank;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

    fn report(rows: usize) -> RankedReport {
        let accounts = (0..rows)
            .map(|idx| {
                let baseline = (idx % 2 == 0).then_some(100);
                AccountReport::new(format!("user{idx}"), 100 + idx as i64, baseline)
            })
            .collect();
        rank(accounts, "Δ-3w")
    }

    #[test]
    fn canvas_grows_with_rows_at_fixed_width() {
        assert_eq!(canvas_size(0), (512, 100));
        assert_eq!(canvas_size(2), (512, 180));
        let mut previous = 0;
        for rows in 0..20 {
            let (width, height) = canvas_size(rows);
            assert_eq!(width, WIDTH);
            assert!(height > previous);
            previous = height;
        }
    }

    #[test]
    fn column_anchors_match_layout() {
        assert_eq!(USERNAME_X, 10);
        assert_eq!(DELTA_RIGHT, 358);
        assert_eq!(NOW_RIGHT, 502);
    }

    #[test]
    fn renders_png_for_empty_report() {
        let png = render_image(&report(0), DEFAULT_FONT).unwrap();
        assert!(png.starts_with(PNG_MAGIC));
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), canvas_size(0));
    }

    #[test]
    fn png_height_tracks_row_count() {
        let small = image::load_from_memory(&render_image(&report(1), DEFAULT_FONT).unwrap())
            .unwrap();
        let large = image::load_from_memory(&render_image(&report(5), DEFAULT_FONT).unwrap())
            .unwrap();
        assert_eq!(small.width(), large.width());
        assert!(large.height() > small.height());
        assert_eq!(large.height(), canvas_size(5).1);
    }

    fn dark_pixels(image: &RgbImage, xs: Range<u32>, ys: Range<u32>) -> usize {
        ys.flat_map(|y| xs.clone().map(move |x| (x, y)))
            .filter(|&(x, y)| image.get_pixel(x, y).0.iter().any(|&channel| channel < 128))
            .count()
    }

    #[test]
    fn unknown_delta_leaves_cell_blank() {
        let ranked = rank(
            vec![
                AccountReport::new("alice", 150, Some(140)),
                AccountReport::new("bob", 42, None),
            ],
            "Δ-3w",
        );
        let png = render_image(&ranked, DEFAULT_FONT).unwrap();
        let pixels = image::load_from_memory(&png).unwrap().to_rgb8();
        let delta_right = DELTA_RIGHT as u32;

        // header, then one band per row
        assert!(dark_pixels(&pixels, 0..WIDTH, 10..50) > 0);
        assert!(dark_pixels(&pixels, 0..WIDTH, 52..90) > 0);
        assert!(dark_pixels(&pixels, 0..WIDTH, 90..130) > 0);
        assert!(dark_pixels(&pixels, USERNAME_X as u32..NOW_RIGHT as u32, 50..51) > 0);

        assert!(dark_pixels(&pixels, delta_right - 60..delta_right, 52..90) > 0);
        assert_eq!(dark_pixels(&pixels, 200..delta_right, 90..130), 0);
    }
}
