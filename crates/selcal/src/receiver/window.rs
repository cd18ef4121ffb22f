//! Sliding sample window
//!
//! The [`Window`] keeps the most recent `len` input samples.
//! New samples are pushed onto the right, and the oldest samples
//! age off the left. The window is always full: before enough
//! samples have arrived, the missing history is zero.
//!
//! ```ignore
//! let mut wind: Window<f32> = Window::new(4);
//! wind.push(&[1.0f32, 2.0f32]);
//! assert_eq!(&[0.0f32, 0.0f32, 1.0f32, 2.0f32], wind.as_slice());
//! ```

use num_traits::Zero;
use slice_ring_buffer::SliceRingBuffer;

/// Fixed-size lookback window of samples
#[derive(Clone, Debug)]
pub struct Window<T>(SliceRingBuffer<T>)
where
    T: Copy + Zero;

impl<T> Window<T>
where
    T: Copy + Zero,
{
    /// Create window of the given `len`, filled with zeros
    pub fn new(len: usize) -> Self {
        let mut out = Self(SliceRingBuffer::with_capacity(len));
        for _i in 0..len {
            out.0.push_back(T::zero());
        }
        out
    }

    /// Reset to zero initial conditions
    ///
    /// Clear the window, filling it with zeros
    pub fn reset(&mut self) {
        let len = self.0.len();
        self.0.clear();
        for _i in 0..len {
            self.0.push_back(T::zero());
        }
    }

    /// Window length
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Append to sample window
    ///
    /// Appends the `input` slice to the right side of the Window.
    /// The last sample of `input` becomes the last sample of the
    /// Window slice. If `input` is longer than the Window, only
    /// its right-most part is kept.
    pub fn push<S>(&mut self, input: S)
    where
        S: AsRef<[T]>,
    {
        let input = input.as_ref();
        let input = if input.len() > self.0.len() {
            &input[input.len() - self.0.len()..]
        } else {
            input
        };

        for &sa in input {
            self.0.pop_front();
            self.0.push_back(sa);
        }
    }

    /// Obtain current window contents, as a slice
    ///
    /// The zeroth sample of the slice is the least recent
    /// sample in the window. The last sample of the slice
    /// is the most recent sample in the window.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        self.0.as_slice()
    }
}

impl<T> AsRef<[T]> for Window<T>
where
    T: Copy + Zero,
{
    fn as_ref(&self) -> &[T] {
        self.as_slice()
    }
}
