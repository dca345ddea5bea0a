//! Synthesizes soft drop shadows from a window mask, via the blurred-mask
//! path (hardware/fast backends) or the summed-area software path
//! (`SLOW_BLUR` backends).

use crate::backend::{Backend, BlitArgs, BlurArgs, Color, ImageFormat, Quirks, Size};
use crate::error::{RenderError, Result};
use crate::geometry::Region;
use crate::kernel::Kernel;

/// Picks the synthesis path per backend quirks and builds the shadow image,
/// returning its handle and the `(-r, -r)`-offset origin relative to the
/// window.
pub fn build_shadow_image(
    backend: &mut dyn Backend,
    window_mask: crate::backend::ImageHandle,
    window_size: (u32, u32),
    radius: u32,
    shadow_color: Color,
    corner_radius: f64,
    blur_context: crate::backend::BlurContextHandle,
) -> Result<(crate::backend::ImageHandle, (i32, i32))> {
    if backend.quirks().contains(Quirks::SLOW_BLUR) {
        build_shadow_software(backend, window_size, radius, shadow_color)
    } else {
        build_shadow_blurred_mask(
            backend,
            window_mask,
            window_size,
            radius,
            shadow_color,
            corner_radius,
            blur_context,
        )
    }
}

/// §4.1 "mask -> shadow, blurred path": blit a white pixel through the
/// window mask into a padded canvas, blur the whole canvas, then blit the
/// shadow color through the blurred silhouette.
fn build_shadow_blurred_mask(
    backend: &mut dyn Backend,
    window_mask: crate::backend::ImageHandle,
    window_size: (u32, u32),
    radius: u32,
    shadow_color: Color,
    corner_radius: f64,
    blur_context: crate::backend::BlurContextHandle,
) -> Result<(crate::backend::ImageHandle, (i32, i32))> {
    let padded_w = window_size.0 + 2 * radius;
    let padded_h = window_size.1 + 2 * radius;
    let padded_size = Size::new(padded_w, padded_h);

    let white = backend
        .new_image(ImageFormat::Pixmap, Size::new(1, 1))
        .ok_or(RenderError::ImageAllocationFailed {
            format: ImageFormat::Pixmap,
            size: (1, 1),
        })?;
    backend.clear(white, Color::new(1.0, 1.0, 1.0, 1.0));

    let silhouette = backend
        .new_image(ImageFormat::Mask, padded_size)
        .ok_or(RenderError::ImageAllocationFailed {
            format: ImageFormat::Mask,
            size: (padded_w, padded_h),
        })?;
    backend.clear(silhouette, Color::TRANSPARENT);

    let center = Region::from_rect(crate::geometry::Rect::new(
        radius as i32,
        radius as i32,
        window_size.0,
        window_size.1,
    ));
    backend.blit(
        silhouette,
        (radius as i32, radius as i32),
        &center,
        &BlitArgs {
            source_image: white,
            source_mask: Some(window_mask),
            opacity: 1.0,
            dim: 0.0,
            corner_radius,
            border_width: 0,
            scale: (1.0, 1.0),
            color_inverted: false,
            max_brightness: 1.0,
        },
    );

    let full = Region::from_rect(crate::geometry::Rect::new(0, 0, padded_w, padded_h));
    backend.blur(
        silhouette,
        (0, 0),
        &full,
        &BlurArgs {
            blur_context,
            source_image: silhouette,
            source_mask: None,
            opacity: 1.0,
        },
    );

    let shadow = backend
        .new_image(ImageFormat::Pixmap, padded_size)
        .ok_or(RenderError::ImageAllocationFailed {
            format: ImageFormat::Pixmap,
            size: (padded_w, padded_h),
        })?;
    backend.clear(shadow, Color::TRANSPARENT);
    backend.blit(
        shadow,
        (0, 0),
        &full,
        &BlitArgs {
            source_image: white,
            source_mask: Some(silhouette),
            opacity: 1.0,
            dim: 0.0,
            corner_radius: 0.0,
            border_width: 0,
            scale: (1.0, 1.0),
            color_inverted: false,
            max_brightness: 1.0,
        },
    );
    backend.fill(shadow, shadow_color, &full);

    backend.release_image(white);
    backend.release_image(silhouette);

    Ok((shadow, (-(radius as i32), -(radius as i32))))
}

/// §4.1 "software/CPU path": classify the padded canvas into nine
/// sub-regions (four convolved corners, four replicated edges, one constant
/// interior) and fill each directly from the summed-area kernel, in
/// `O(W+H+r^2)` instead of full per-pixel convolution.
fn build_shadow_software(
    backend: &mut dyn Backend,
    window_size: (u32, u32),
    radius: u32,
    shadow_color: Color,
) -> Result<(crate::backend::ImageHandle, (i32, i32))> {
    let target = 0.5 / 256.0;
    let kernel_size = 2 * radius + 1;
    let kernel = crate::kernel::gaussian_kernel_std_for_size(kernel_size.max(1) | 1, target);

    let (w, h) = window_size;
    let padded_w = w + 2 * radius;
    let padded_h = h + 2 * radius;

    let limit = backend.max_request_image_size();
    if padded_w > limit || padded_h > limit {
        return Err(RenderError::ShadowKernelOverflow {
            requested: padded_w.max(padded_h),
            limit,
        });
    }

    let alpha = render_alpha_mask(&kernel, w, h, radius, shadow_color.a);

    let handle = backend
        .new_image(ImageFormat::Pixmap, Size::new(padded_w, padded_h))
        .ok_or(RenderError::ImageAllocationFailed {
            format: ImageFormat::Pixmap,
            size: (padded_w, padded_h),
        })?;
    backend.clear(handle, Color::TRANSPARENT);
    backend.upload_alpha_mask(handle, &alpha);

    Ok((handle, (-(radius as i32), -(radius as i32))))
}

/// Produces the 8-bit alpha buffer for [`build_shadow_software`] directly
/// from the kernel's summed-area table, without calling into the backend.
/// Split out so the per-pixel math (the actual performance-sensitive part of
/// §4.1) is testable without a `Backend`. Returned as an `image::GrayImage`
/// so the pixel buffer is ready for the backend's standard upload path.
///
/// Each output pixel is the exact 2-D convolution of the kernel with the
/// window's rectangular silhouette: since that silhouette is an axis-aligned
/// box, the convolution at `(px, py)` is itself a single rectangle sum over
/// the kernel — the kernel indices whose offset from `(px, py)` lands inside
/// the window on both axes — so one summed-area lookup per pixel gives the
/// exact value, fading correctly in every direction away from the window.
pub fn render_alpha_mask(kernel: &Kernel, w: u32, h: u32, radius: u32, opacity: f64) -> image::GrayImage {
    let padded_w = w + 2 * radius;
    let padded_h = h + 2 * radius;
    let mut alpha = image::GrayImage::new(padded_w, padded_h);

    for py in 0..padded_h as i32 {
        for px in 0..padded_w as i32 {
            let coverage = kernel.sum_kernel_normalized(px - w as i32 + 1, py - h as i32 + 1, w, h);
            let value = (coverage * opacity * 255.0).round() as u8;
            alpha.put_pixel(px as u32, py as u32, image::Luma([value]));
        }
    }

    alpha
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interior_pixel_matches_flat_opacity() {
        let mut kernel = Kernel::gaussian(5);
        kernel.preprocess();
        let alpha = render_alpha_mask(&kernel, 100, 100, 5, 0.5);
        let value = alpha.get_pixel(55, 55).0[0];
        assert_eq!(value, (0.5_f64 * 255.0).round() as u8);
    }

    #[test]
    fn corner_pixel_matches_the_kernel_corner_weight() {
        let mut kernel = Kernel::gaussian(5);
        kernel.preprocess();
        let alpha = render_alpha_mask(&kernel, 100, 100, 5, 0.5);
        let corner = alpha.get_pixel(0, 0).0[0];
        let expected = (kernel.sum_kernel_normalized(0, 0, 1, 1) * 0.5 * 255.0).round() as u8;
        assert_eq!(corner, expected);
        let interior = alpha.get_pixel(55, 55).0[0];
        assert!(corner < interior, "corner {corner} should be darker than interior {interior}");
    }

    #[test]
    fn small_window_produces_full_sized_alpha_image() {
        let mut kernel = Kernel::gaussian(10);
        kernel.preprocess();
        // window smaller than 2*radius on both axes
        let alpha = render_alpha_mask(&kernel, 5, 5, 10, 1.0);
        assert_eq!((alpha.width(), alpha.height()), (25, 25));
    }
}
