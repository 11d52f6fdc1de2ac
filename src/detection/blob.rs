// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 连通域提取
//! Connected-component blob extraction with size and shape filters

use super::types::{Blob, BoundingBox, ForegroundMask, Point2, BACKGROUND};
use crate::config::CounterConfig;
use imageproc::region_labelling::{connected_components, Connectivity};
use image::Luma;
use log::trace;

/// 单个连通域的累积统计
struct ComponentStats {
    /// 首个像素的光栅位置
    first: u64,
    area: u32,
    sum_x: u64,
    sum_y: u64,
    bbox: BoundingBox,
}

pub struct BlobExtractor {
    min_area: u32,
    max_area: u32,
    /// 宽高比范围 (箱形目标过滤)
    aspect_ratio_range: Option<(f32, f32)>,
    /// 面积 / 外接框面积 下限
    min_fill_ratio: Option<f32>,
    connectivity: Connectivity,
}

impl BlobExtractor {
    pub fn new(min_area: u32, max_area: u32) -> Self {
        Self {
            min_area,
            max_area,
            aspect_ratio_range: None,
            min_fill_ratio: None,
            connectivity: Connectivity::Eight,
        }
    }

    pub fn from_config(config: &CounterConfig) -> Self {
        Self {
            aspect_ratio_range: config.aspect_ratio_range,
            min_fill_ratio: config.min_fill_ratio,
            ..Self::new(config.min_blob_area, config.max_blob_area)
        }
    }

    pub fn with_aspect_ratio_range(mut self, range: Option<(f32, f32)>) -> Self {
        self.aspect_ratio_range = range;
        self
    }

    pub fn with_min_fill_ratio(mut self, ratio: Option<f32>) -> Self {
        self.min_fill_ratio = ratio;
        self
    }

    pub fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = connectivity;
        self
    }

    /// 掩码 → 连通域 (按发现顺序, 即光栅扫描中首个像素的顺序)
    pub fn extract(&self, mask: &ForegroundMask) -> Vec<Blob> {
        if mask.width() == 0 || mask.height() == 0 {
            return Vec::new();
        }

        let labels = connected_components(mask.as_image(), self.connectivity, Luma([BACKGROUND]));

        // 0 为背景标签
        let mut stats: Vec<Option<ComponentStats>> = Vec::new();
        for (x, y, label) in labels.enumerate_pixels() {
            let label = label.0[0] as usize;
            if label == 0 {
                continue;
            }
            if stats.len() < label {
                stats.resize_with(label, || None);
            }
            let entry = stats[label - 1].get_or_insert_with(|| ComponentStats {
                first: y as u64 * mask.width() as u64 + x as u64,
                area: 0,
                sum_x: 0,
                sum_y: 0,
                bbox: BoundingBox::new(x, y, x, y),
            });
            entry.area += 1;
            entry.sum_x += x as u64;
            entry.sum_y += y as u64;
            entry.bbox.include(x, y);
        }

        let mut components: Vec<ComponentStats> = stats.into_iter().flatten().collect();
        components.sort_by_key(|c| c.first);

        let blobs: Vec<Blob> = components
            .into_iter()
            .filter(|c| self.accept(c))
            .map(|c| Blob {
                centroid: Point2::new(
                    c.sum_x as f32 / c.area as f32,
                    c.sum_y as f32 / c.area as f32,
                ),
                bbox: c.bbox,
                area: c.area,
            })
            .collect();

        trace!("连通域: {} 个保留", blobs.len());
        blobs
    }

    fn accept(&self, c: &ComponentStats) -> bool {
        if c.area < self.min_area || c.area > self.max_area {
            return false;
        }
        if let Some((lo, hi)) = self.aspect_ratio_range {
            let ratio = c.bbox.aspect_ratio();
            if ratio < lo || ratio > hi {
                return false;
            }
        }
        if let Some(min_fill) = self.min_fill_ratio {
            // 过于稀疏的形状多为碎片
            if (c.area as f32 / c.bbox.area() as f32) < min_fill {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill_rect(mask: &mut ForegroundMask, x: u32, y: u32, w: u32, h: u32) {
        for yy in y..y + h {
            for xx in x..x + w {
                mask.set(xx, yy, true);
            }
        }
    }

    #[test]
    fn test_empty_mask_yields_nothing() {
        let extractor = BlobExtractor::new(1, 1000);
        assert!(extractor.extract(&ForegroundMask::empty(40, 30)).is_empty());
        assert!(extractor.extract(&ForegroundMask::empty(0, 0)).is_empty());
    }

    #[test]
    fn test_centroid_and_bbox() {
        let mut mask = ForegroundMask::empty(50, 50);
        fill_rect(&mut mask, 10, 20, 5, 3);
        let blobs = BlobExtractor::new(1, 1000).extract(&mask);
        assert_eq!(blobs.len(), 1);
        let blob = &blobs[0];
        assert_eq!(blob.area, 15);
        assert_eq!(blob.bbox, BoundingBox::new(10, 20, 14, 22));
        assert!((blob.centroid.x - 12.0).abs() < 1e-5);
        assert!((blob.centroid.y - 21.0).abs() < 1e-5);
    }

    #[test]
    fn test_area_filter() {
        let mut mask = ForegroundMask::empty(100, 100);
        fill_rect(&mut mask, 0, 0, 2, 2); // 4 px, 噪点
        fill_rect(&mut mask, 20, 20, 10, 10); // 100 px
        fill_rect(&mut mask, 50, 50, 40, 40); // 1600 px, 过大
        let blobs = BlobExtractor::new(10, 1000).extract(&mask);
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].area, 100);
    }

    #[test]
    fn test_discovery_order() {
        let mut mask = ForegroundMask::empty(60, 60);
        fill_rect(&mut mask, 40, 5, 4, 4);
        fill_rect(&mut mask, 5, 30, 4, 4);
        fill_rect(&mut mask, 5, 5, 4, 4);
        let blobs = BlobExtractor::new(1, 100).extract(&mask);
        let tops: Vec<(u32, u32)> = blobs.iter().map(|b| (b.bbox.x1, b.bbox.y1)).collect();
        assert_eq!(tops, vec![(5, 5), (40, 5), (5, 30)]);
    }

    #[test]
    fn test_connectivity() {
        let mut mask = ForegroundMask::empty(10, 10);
        mask.set(2, 2, true);
        mask.set(3, 3, true);
        let eight = BlobExtractor::new(1, 100).extract(&mask);
        assert_eq!(eight.len(), 1);
        let four = BlobExtractor::new(1, 100)
            .with_connectivity(Connectivity::Four)
            .extract(&mask);
        assert_eq!(four.len(), 2);
    }

    #[test]
    fn test_shape_filters() {
        let mut mask = ForegroundMask::empty(100, 100);
        fill_rect(&mut mask, 0, 0, 40, 2); // 细长条
        fill_rect(&mut mask, 50, 50, 10, 10); // 方块
        let blobs = BlobExtractor::new(1, 1000)
            .with_aspect_ratio_range(Some((0.3, 3.0)))
            .extract(&mask);
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].bbox.x1, 50);

        // 对角线: 面积远小于外接框
        let mut diag = ForegroundMask::empty(20, 20);
        for i in 0..20 {
            diag.set(i, i, true);
        }
        let sparse = BlobExtractor::new(1, 1000)
            .with_min_fill_ratio(Some(0.3))
            .extract(&diag);
        assert!(sparse.is_empty());
    }
}
