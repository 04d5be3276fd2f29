use crate::render::{PickingMode, PickingOptions, SurfaceRegion, SurfaceSize};
use serde::{Deserialize, Serialize};

/// How the composed surface is divided between executors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RegionLayout {
    /// Every executor covers the full surface; their outputs are stacked
    #[default]
    Layered,
    /// The surface is cut into `n` vertical strips of near-equal width
    Columns,
}

impl RegionLayout {
    /// Regions for `n` executors on a surface of `size`.
    pub fn regions(&self, size: SurfaceSize, n: usize) -> Vec<SurfaceRegion> {
        let full = SurfaceRegion::new(0, 0, size.width, size.height);
        match self {
            RegionLayout::Layered => vec![full; n],
            RegionLayout::Columns => {
                let w = size.width as usize;
                (0..n)
                    .map(|i| {
                        let x0 = i * w / n;
                        let x1 = (i + 1) * w / n;
                        SurfaceRegion::new(x0 as i32, 0, (x1 - x0) as u32, size.height)
                    })
                    .collect()
            }
        }
    }
}

/// True when a pick query can hit something drawn inside `region`.
pub(crate) fn region_accepts(region: &SurfaceRegion, options: &PickingOptions) -> bool {
    match options.mode {
        PickingMode::Position => options.position.is_some_and(|p| region.contains(p)),
        PickingMode::Area => match options.area {
            Some(area) if region.width > 0 && region.height > 0 => region.as_rect().intersects(&area),
            Some(_) => true,
            None => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Rect;

    #[test]
    fn layered_regions_cover_full_surface() {
        let regions = RegionLayout::Layered.regions(SurfaceSize::new(800, 600), 3);
        assert_eq!(regions, vec![SurfaceRegion::new(0, 0, 800, 600); 3]);
    }

    #[test]
    fn columns_tile_without_gaps() {
        let regions = RegionLayout::Columns.regions(SurfaceSize::new(100, 50), 3);
        assert_eq!(
            regions,
            vec![
                SurfaceRegion::new(0, 0, 33, 50),
                SurfaceRegion::new(33, 0, 33, 50),
                SurfaceRegion::new(66, 0, 34, 50),
            ]
        );
        let total: u32 = regions.iter().map(|r| r.width).sum();
        assert_eq!(total, 100);
    }

    #[test]
    fn pick_routing_by_region() {
        let left = SurfaceRegion::new(0, 0, 50, 50);
        let right = SurfaceRegion::new(50, 0, 50, 50);
        let q = PickingOptions::at(60.0, 10.0);
        assert!(!region_accepts(&left, &q));
        assert!(region_accepts(&right, &q));

        let area = PickingOptions::within(Rect::new(40.0, 0.0, 20.0, 5.0));
        assert!(region_accepts(&left, &area));
        assert!(region_accepts(&right, &area));
    }
}
