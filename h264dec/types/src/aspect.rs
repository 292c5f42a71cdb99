/*!
    Picture aspect ratio.
*/

use std::fmt;

/**
    A picture aspect ratio, e.g. 16:9.

    Stored reduced to lowest terms. Zero components are not representable.
*/
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AspectRatio {
    pub x: u32,
    pub y: u32,
}

impl AspectRatio {
    /**
        Create a reduced aspect ratio.

        Returns None if either component is zero.
    */
    pub fn new(x: u32, y: u32) -> Option<Self> {
        if x == 0 || y == 0 {
            return None;
        }
        let g = gcd(x, y);
        Some(Self { x: x / g, y: y / g })
    }

    /**
        The aspect ratio of a frame with square pixels.
    */
    pub fn of_frame(width: u32, height: u32) -> Self {
        Self::new(width, height).unwrap_or(Self { x: 1, y: 1 })
    }

    /**
        Pixels-per-meter pair encoding this picture aspect for a frame of the
        given size, as carried by plain bitmap headers.

        Returns None if either component overflows.
    */
    pub fn pels_per_meter(self, width: u32, height: u32) -> Option<(u32, u32)> {
        Some((width.checked_mul(self.y)?, height.checked_mul(self.x)?))
    }

    /**
        Convert to f64.
    */
    #[inline]
    pub fn to_f64(self) -> f64 {
        self.x as f64 / self.y as f64
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

impl fmt::Debug for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.x, self.y)
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.x, self.y)
    }
}
