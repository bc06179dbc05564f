pub mod math {
    pub fn degree_to_radian(degree: f32) -> f32 {
        degree * std::f32::consts::PI / 180.0
    }

    /// Number of `size`-wide chunks needed to cover `extent`.
    pub fn ceil_div(extent: u32, size: u32) -> u32 {
        extent.div_ceil(size)
    }
}


pub mod color {
    use glam::Vec3;

    /// Fully saturated, full value color for a hue in `[0, 1)`.
    pub fn hue_to_rgb(hue: f32) -> Vec3 {
        let h = hue.rem_euclid(1.0) * 6.0;
        let x = 1.0 - (h % 2.0 - 1.0).abs();
        match h as u32 {
            0 => Vec3::new(1.0, x, 0.0),
            1 => Vec3::new(x, 1.0, 0.0),
            2 => Vec3::new(0.0, 1.0, x),
            3 => Vec3::new(0.0, x, 1.0),
            4 => Vec3::new(x, 0.0, 1.0),
            _ => Vec3::new(1.0, 0.0, x),
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn primary_hues() {
            assert_eq!(Vec3::new(1.0, 0.0, 0.0), hue_to_rgb(0.0));
            assert_eq!(Vec3::new(0.0, 1.0, 0.0), hue_to_rgb(1.0 / 3.0));
            assert_eq!(Vec3::new(0.0, 0.0, 1.0), hue_to_rgb(2.0 / 3.0));
        }

        #[test]
        fn always_saturated() {
            for i in 0..64 {
                let c = hue_to_rgb(i as f32 / 64.0);
                assert_eq!(1.0, c.max_element());
                assert_eq!(0.0, c.min_element());
            }
        }
    }
}
