use shared::domain::ViewState;

use crate::config::Settings;

pub const MIN_WIDTH: f64 = 600.0;
pub const MIN_HEIGHT: f64 = 600.0;
pub const MAX_HEIGHT: f64 = 1000.0;
pub const REFERENCE_SIZE: f64 = 650.0;

pub const MIN_DIAMETER_SIZE: f64 = 30.0;
pub const MAX_DIAMETER_SIZE: f64 = 50.0;
pub const MIN_AREA_SIZE: f64 = 50.0;
pub const MAX_AREA_SIZE: f64 = 110.0;

const HEIGHT_CORRECTION: f64 = 1.0;
const CIRCLE_PADDING: f64 = 0.0;
const ZOOMED_PADDING: f64 = 60.0;
const ZOOMED_PAPER_PADDING: f64 = 35.0;

/// Raw dimensions supplied by the viewport probe. `container_height` may be
/// zero while the host is hidden; the sizer then falls back to the window
/// viewport.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewportSnapshot {
    pub container_width: f64,
    pub container_height: f64,
    pub window_width: f64,
    pub window_height: f64,
    pub heading_height: f64,
    pub timeline_strip_height: f64,
    pub list_panel_width: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleRange {
    pub min: f64,
    pub max: f64,
}

impl ScaleRange {
    fn padded(vis_size: f64, padding: f64) -> Self {
        Self {
            min: padding,
            max: vis_size - padding,
        }
    }
}

/// Derived per sizing pass, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutMetrics {
    pub available_width: f64,
    pub available_height: f64,
    pub vis_size: f64,
    pub correction_factor: f64,
    pub circle_range: ScaleRange,
    pub paper_range: ScaleRange,
    pub chart_range: ScaleRange,
    pub circle_chart_range: ScaleRange,
    pub zoomed_range: ScaleRange,
    pub zoomed_paper_range: ScaleRange,
    pub canvas_width: f64,
}

pub struct LayoutSizer {
    min_width: f64,
    min_height: f64,
    max_size: f64,
    reference_size: f64,
    bubble_min_scale: f64,
    bubble_max_scale: f64,
    paper_min_scale: f64,
    paper_max_scale: f64,
}

impl LayoutSizer {
    pub fn new(settings: &Settings) -> Self {
        Self {
            min_width: settings.min_width,
            min_height: settings.min_height,
            max_size: settings.max_height,
            reference_size: REFERENCE_SIZE,
            bubble_min_scale: settings.bubble_min_scale,
            bubble_max_scale: settings.bubble_max_scale,
            paper_min_scale: settings.paper_min_scale,
            paper_max_scale: settings.paper_max_scale,
        }
    }

    /// Square-fit sizing: the chart is always a square, never stretched per
    /// axis. Both available dimensions must strictly exceed their minimums,
    /// otherwise the configured minimum square is used.
    pub fn compute(
        &self,
        viewport: &ViewportSnapshot,
        state: ViewState,
        dataset_count: usize,
    ) -> LayoutMetrics {
        let container_height = if viewport.container_height == 0.0 {
            viewport.window_height.max(0.0)
        } else {
            viewport.container_height
        };

        let mut available_height = container_height - viewport.heading_height - HEIGHT_CORRECTION;
        let available_width;
        if state == ViewState::Timeline {
            available_height -= viewport.timeline_strip_height;
            available_width = viewport.container_width;
        } else {
            available_width = viewport.container_width - viewport.list_panel_width;
        }

        let mut vis_size =
            if available_width > self.min_width && available_height > self.min_height {
                available_width.min(available_height)
            } else {
                self.min_size()
            };
        if vis_size > self.max_size {
            vis_size = self.max_size;
        }

        let correction_factor = vis_size / self.reference_size;

        let circle_range = ScaleRange {
            min: MIN_AREA_SIZE * correction_factor * self.bubble_min_scale,
            max: MAX_AREA_SIZE * correction_factor * self.bubble_max_scale,
        };
        let paper_range = ScaleRange {
            min: MIN_DIAMETER_SIZE * correction_factor * self.paper_min_scale,
            max: MAX_DIAMETER_SIZE * correction_factor * self.paper_max_scale,
        };

        let canvas_width = if state == ViewState::Timeline {
            vis_size * dataset_count as f64
        } else {
            vis_size
        };

        LayoutMetrics {
            available_width,
            available_height,
            vis_size,
            correction_factor,
            circle_range,
            paper_range,
            chart_range: ScaleRange::padded(vis_size, paper_range.max),
            circle_chart_range: ScaleRange::padded(vis_size, CIRCLE_PADDING),
            zoomed_range: ScaleRange::padded(vis_size, ZOOMED_PADDING),
            zoomed_paper_range: ScaleRange::padded(vis_size, ZOOMED_PAPER_PADDING),
            canvas_width,
        }
    }

    fn min_size(&self) -> f64 {
        self.min_width.min(self.min_height)
    }
}

/// Maps `value` from `domain` into `range`. A degenerate domain collapses to
/// the middle of the range.
pub fn linear_scale(domain: (f64, f64), range: (f64, f64), value: f64) -> f64 {
    let span = domain.1 - domain.0;
    if span == 0.0 {
        return (range.0 + range.1) / 2.0;
    }
    range.0 + (value - domain.0) / span * (range.1 - range.0)
}

/// Square-root variant used for area and diameter scales, so that rendered
/// surface grows linearly with the underlying count.
pub fn sqrt_scale(domain: (f64, f64), range: (f64, f64), value: f64) -> f64 {
    let lo = domain.0.max(0.0).sqrt();
    let hi = domain.1.max(0.0).sqrt();
    let span = hi - lo;
    if span == 0.0 {
        return (range.0 + range.1) / 2.0;
    }
    range.0 + (value.max(0.0).sqrt() - lo) / span * (range.1 - range.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(width: f64, height: f64) -> ViewportSnapshot {
        ViewportSnapshot {
            container_width: width,
            container_height: height,
            window_width: width,
            window_height: height,
            ..ViewportSnapshot::default()
        }
    }

    fn sizer() -> LayoutSizer {
        LayoutSizer::new(&Settings::default())
    }

    #[test]
    fn square_fit_takes_the_smaller_available_dimension() {
        // 801 high so the fixed 1px correction leaves exactly 800 available.
        let metrics = sizer().compute(&snapshot(800.0, 801.0), ViewState::Overview, 1);

        assert_eq!(metrics.available_width, 800.0);
        assert_eq!(metrics.available_height, 800.0);
        assert_eq!(metrics.vis_size, 800.0);
    }

    #[test]
    fn small_viewport_falls_back_to_the_minimum_square() {
        let metrics = sizer().compute(&snapshot(300.0, 300.0), ViewState::Overview, 1);
        assert_eq!(metrics.vis_size, 600.0);
    }

    #[test]
    fn available_size_must_strictly_exceed_the_minimums() {
        // 600 available on the height axis equals the minimum, so the
        // fallback square wins even though the width would fit.
        let metrics = sizer().compute(&snapshot(900.0, 601.0), ViewState::Overview, 1);
        assert_eq!(metrics.available_height, 600.0);
        assert_eq!(metrics.vis_size, 600.0);
    }

    #[test]
    fn oversized_viewport_is_clamped_to_the_maximum() {
        let metrics = sizer().compute(&snapshot(1600.0, 1600.0), ViewState::Overview, 1);
        assert_eq!(metrics.vis_size, 1000.0);
    }

    #[test]
    fn hidden_container_uses_the_window_viewport() {
        let viewport = ViewportSnapshot {
            container_width: 801.0,
            container_height: 0.0,
            window_width: 801.0,
            window_height: 801.0,
            ..ViewportSnapshot::default()
        };
        let metrics = sizer().compute(&viewport, ViewState::Overview, 1);
        assert_eq!(metrics.vis_size, 800.0);
    }

    #[test]
    fn zero_sized_container_still_yields_the_minimum_square() {
        let metrics = sizer().compute(&snapshot(0.0, 0.0), ViewState::Overview, 0);
        assert_eq!(metrics.vis_size, 600.0);
        assert_eq!(metrics.canvas_width, 600.0);
    }

    #[test]
    fn timeline_subtracts_the_label_strip_and_keeps_full_width() {
        let viewport = ViewportSnapshot {
            container_width: 900.0,
            container_height: 901.0,
            window_width: 900.0,
            window_height: 901.0,
            timeline_strip_height: 40.0,
            list_panel_width: 250.0,
            ..ViewportSnapshot::default()
        };
        let metrics = sizer().compute(&viewport, ViewState::Timeline, 3);

        assert_eq!(metrics.available_height, 860.0);
        assert_eq!(metrics.available_width, 900.0);
        assert_eq!(metrics.vis_size, 860.0);
        assert_eq!(metrics.canvas_width, 2580.0);
    }

    #[test]
    fn list_panel_narrows_the_overview_width() {
        let viewport = ViewportSnapshot {
            container_width: 900.0,
            container_height: 901.0,
            window_width: 900.0,
            window_height: 901.0,
            list_panel_width: 250.0,
            ..ViewportSnapshot::default()
        };
        let metrics = sizer().compute(&viewport, ViewState::Overview, 1);
        assert_eq!(metrics.available_width, 650.0);
        assert_eq!(metrics.vis_size, 650.0);
    }

    #[test]
    fn reference_sized_chart_keeps_the_design_constants() {
        // vis_size 650 makes the correction factor exactly 1.
        let metrics = sizer().compute(&snapshot(650.0, 651.0), ViewState::Overview, 1);

        assert_eq!(metrics.correction_factor, 1.0);
        assert_eq!(metrics.circle_range, ScaleRange { min: 50.0, max: 110.0 });
        assert_eq!(metrics.paper_range, ScaleRange { min: 30.0, max: 50.0 });
        assert_eq!(metrics.chart_range, ScaleRange { min: 50.0, max: 600.0 });
        assert_eq!(
            metrics.circle_chart_range,
            ScaleRange { min: 0.0, max: 650.0 }
        );
        assert_eq!(metrics.zoomed_range, ScaleRange { min: 60.0, max: 590.0 });
        assert_eq!(
            metrics.zoomed_paper_range,
            ScaleRange { min: 35.0, max: 615.0 }
        );
    }

    #[test]
    fn scale_multipliers_stretch_the_ranges_independently() {
        let settings = Settings {
            bubble_min_scale: 0.5,
            bubble_max_scale: 2.0,
            paper_min_scale: 0.5,
            paper_max_scale: 2.0,
            ..Settings::default()
        };
        let metrics =
            LayoutSizer::new(&settings).compute(&snapshot(650.0, 651.0), ViewState::Overview, 1);

        assert_eq!(metrics.circle_range, ScaleRange { min: 25.0, max: 220.0 });
        assert_eq!(metrics.paper_range, ScaleRange { min: 15.0, max: 100.0 });
    }

    #[test]
    fn linear_scale_maps_and_degenerates_to_midpoint() {
        assert_eq!(linear_scale((0.0, 10.0), (0.0, 100.0), 5.0), 50.0);
        assert_eq!(linear_scale((3.0, 3.0), (0.0, 100.0), 3.0), 50.0);
    }

    #[test]
    fn sqrt_scale_grows_with_the_square_root() {
        let mid = sqrt_scale((0.0, 100.0), (0.0, 10.0), 25.0);
        assert!((mid - 5.0).abs() < 1e-9);
    }
}
