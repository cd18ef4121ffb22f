/// Data with an expiration time
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimedData<D> {
    /// Data
    pub data: D,

    /// Last input sample count at which the data is still valid
    pub deadline: u64,
}

impl<D> TimedData<D> {
    /// Store `data` with the given `deadline`
    pub fn with_deadline(data: D, deadline: u64) -> Self {
        TimedData { data, deadline }
    }

    /// Check for expiration
    ///
    /// The data remains valid *at* its deadline and expires
    /// on the sample after.
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.deadline < now
    }
}

impl<D> AsRef<D> for TimedData<D> {
    fn as_ref(&self) -> &D {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry() {
        let data = TimedData::with_deadline('A', 100);
        assert_eq!(&'A', data.as_ref());
        assert!(!data.is_expired_at(99));
        assert!(!data.is_expired_at(100));
        assert!(data.is_expired_at(101));
    }
}
