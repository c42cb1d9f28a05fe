//! Structural member queries.
//!
//! The signature resolver matches members by declared element-type name
//! instead of positional metadata offsets. The engine requires such lookups
//! to yield exactly one match per declaring type; [`Lookup`] models the three
//! possible outcomes explicitly, so the zero and many cases can never be
//! silently collapsed into a first pick.

/// Outcome of a uniqueness-requiring member query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<T> {
    /// Exactly one member matched.
    Found(T),
    /// No member matched.
    NotFound,
    /// More than one member matched.
    Ambiguous,
}

impl<T> Lookup<T> {
    /// Run a uniqueness query over an iterator of candidates.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cilpatch::metadata::query::Lookup;
    ///
    /// let values = [1, 2, 3];
    /// assert_eq!(Lookup::unique(values.iter().filter(|v| **v == 2)), Lookup::Found(&2));
    /// assert_eq!(Lookup::unique(values.iter().filter(|v| **v > 9)), Lookup::<&i32>::NotFound);
    /// assert_eq!(Lookup::unique(values.iter().filter(|v| **v > 1)), Lookup::<&i32>::Ambiguous);
    /// ```
    pub fn unique<I: IntoIterator<Item = T>>(candidates: I) -> Lookup<T> {
        let mut iter = candidates.into_iter();
        match iter.next() {
            None => Lookup::NotFound,
            Some(first) => match iter.next() {
                None => Lookup::Found(first),
                Some(_) => Lookup::Ambiguous,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_single_match() {
        let lookup = Lookup::unique(std::iter::once(7));
        assert_eq!(lookup, Lookup::Found(7));
    }

    #[test]
    fn unique_empty_is_not_found() {
        let lookup: Lookup<i32> = Lookup::unique(std::iter::empty());
        assert_eq!(lookup, Lookup::NotFound);
    }

    #[test]
    fn unique_two_matches_is_ambiguous() {
        let lookup = Lookup::unique([1, 2]);
        assert_eq!(lookup, Lookup::Ambiguous);
    }
}
