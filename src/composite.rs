//
// composite.rs
// Tag2Dcm-rs
//
// Expands a label map into a false-color RGB image through the palette.
//

use ndarray::{Array, ArrayD, IxDyn};

use crate::labels::LabelMap;
use crate::palette::{Palette, Rgb, BLACK};

/// 8-bit RGB image with shape `labels.shape + [3]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeImage {
    pixels: ArrayD<u8>,
    anomalies: usize,
}

impl CompositeImage {
    pub fn pixels(&self) -> &ArrayD<u8> {
        &self.pixels
    }

    pub fn shape(&self) -> &[usize] {
        self.pixels.shape()
    }

    /// Spatial shape, without the trailing channel axis.
    pub fn spatial_shape(&self) -> &[usize] {
        let shape = self.pixels.shape();
        &shape[..shape.len() - 1]
    }

    /// Number of samples whose label had no palette entry (rendered black).
    pub fn anomalies(&self) -> usize {
        self.anomalies
    }

    /// Row-major, channel-interleaved bytes (planar configuration 0).
    pub fn to_interleaved_bytes(&self) -> Vec<u8> {
        // `iter` walks in logical order regardless of memory layout.
        self.pixels.iter().copied().collect()
    }
}

/// Palette gather over the whole label map. Labels beyond the table map to black and are counted.
pub fn composite(labels: &LabelMap, palette: &Palette) -> CompositeImage {
    let colors: ArrayD<Option<Rgb>> = labels.values().mapv(|label| palette.lookup(label));
    let anomalies = colors.iter().filter(|c| c.is_none()).count();

    let mut shape = colors.shape().to_vec();
    shape.push(3);
    // `iter` yields logical (row-major) order for any input layout.
    let data: Vec<u8> = colors
        .iter()
        .flat_map(|c| c.unwrap_or(BLACK))
        .collect();
    let pixels = Array::from_shape_vec(IxDyn(&shape), data)
        .expect("gather output has exactly three bytes per label");

    CompositeImage { pixels, anomalies }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::PALETTE;
    use ndarray::array;

    fn label_map(values: ndarray::Array2<u16>) -> LabelMap {
        LabelMap::new(values.into_dyn())
    }

    #[test]
    fn maps_named_tissue_labels() {
        let out = composite(&label_map(array![[1, 2], [5, 7]]), &PALETTE);
        let expected = array![
            [[255u8, 0, 0], [0, 255, 0]],
            [[255, 255, 0], [0, 255, 255]]
        ]
        .into_dyn();
        assert_eq!(out.pixels(), &expected);
        assert_eq!(out.anomalies(), 0);
    }

    #[test]
    fn unknown_and_undefined_labels() {
        let out = composite(&label_map(array![[12, 99]]), &PALETTE);
        assert_eq!(out.to_interleaved_bytes(), vec![0, 0, 255, 0, 0, 0]);
        assert_eq!(out.anomalies(), 0);
    }

    #[test]
    fn out_of_range_labels_are_black_and_counted() {
        let out = composite(&label_map(array![[1, 300], [65535, 0]]), &PALETTE);
        assert_eq!(
            out.to_interleaved_bytes(),
            vec![255, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]
        );
        assert_eq!(out.anomalies(), 2);
    }

    #[test]
    fn transposed_labels_keep_logical_order() {
        let labels = LabelMap::new(array![[1u16, 5], [2, 7]].reversed_axes().into_dyn());
        let out = composite(&labels, &PALETTE);
        assert_eq!(
            out.to_interleaved_bytes(),
            vec![255, 0, 0, 0, 255, 0, 255, 255, 0, 0, 255, 255]
        );
    }

    #[test]
    fn shape_gains_a_channel_axis() {
        let labels = LabelMap::new(ArrayD::zeros(IxDyn(&[3, 4, 5])));
        let out = composite(&labels, &PALETTE);
        assert_eq!(out.shape(), &[3, 4, 5, 3]);
        assert_eq!(out.spatial_shape(), &[3, 4, 5]);
    }

    #[test]
    fn composite_is_deterministic() {
        let labels = LabelMap::new(ArrayD::from_shape_fn(IxDyn(&[16, 16]), |idx| {
            ((idx[0] * 16 + idx[1]) % 14) as u16
        }));
        assert_eq!(composite(&labels, &PALETTE), composite(&labels, &PALETTE));
    }
}
