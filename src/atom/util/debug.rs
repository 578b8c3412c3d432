use std::fmt;

pub struct DebugEllipsis(pub Option<usize>);

impl fmt::Debug for DebugEllipsis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("...")?;
        if let Some(size) = self.0 {
            write!(f, "({size})")?;
        }
        Ok(())
    }
}

/// Debug-formats at most `limit` items of a list, followed by an ellipsis with the remaining count.
pub struct DebugList<I> {
    items: I,
    limit: usize,
}

impl<I> DebugList<I> {
    pub fn new(items: I, limit: usize) -> Self {
        Self { items, limit }
    }
}

impl<I, T> fmt::Debug for DebugList<I>
where
    I: ExactSizeIterator<Item = T> + Clone,
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.items.len();
        let mut list = f.debug_list();
        list.entries(self.items.clone().take(self.limit));
        if len > self.limit {
            list.entry(&DebugEllipsis(Some(len - self.limit)));
        }
        list.finish()
    }
}
