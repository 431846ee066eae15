use serde::Serialize;

/// `from`/`limit` request parameters. `limit <= 0` means unbounded.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pagination {
    pub from: usize,
    pub limit: i64,
}

impl Pagination {
    pub fn new(from: usize, limit: i64) -> Self {
        Pagination { from, limit }
    }

    /// Clamps `from` to `[0, len]` and slices `data` accordingly.
    /// `limit <= 0` returns the unbounded tail slice; otherwise returns
    /// at most `limit` items starting at `from`.
    pub fn apply<T: Clone>(&self, data: &[T]) -> Paginated<T> {
        let len = data.len();
        let from = self.from.min(len);

        let slice: Vec<T> = if self.limit <= 0 {
            data[from..].to_vec()
        } else {
            let limit = self.limit as usize;
            let end = (from + limit).min(len);
            data[from..end].to_vec()
        };

        Paginated {
            returned: slice.len(),
            total: len,
            from,
            limit: self.limit,
            has_more: from + slice.len() < len,
            data: slice,
            bounded: self.limit > 0,
        }
    }
}

/// Result of applying a [`Pagination`] window to a slice. `bounded`
/// tracks whether the original request had `limit > 0` — when it
/// didn't, [`Paginated::into_response`] emits the bare slice with no
/// envelope, matching the unbounded-request wire shape.
#[derive(Debug, Clone)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub from: usize,
    pub limit: i64,
    pub total: usize,
    pub returned: usize,
    pub has_more: bool,
    bounded: bool,
}

#[derive(Debug, Serialize)]
struct EnvelopedResponse<'a, T> {
    data: &'a [T],
    pagination: PaginationInfo,
}

#[derive(Debug, Serialize)]
struct PaginationInfo {
    from: usize,
    limit: i64,
    total: usize,
    returned: usize,
    has_more: bool,
}

impl<T: Serialize> Paginated<T> {
    /// Bare slice when the request was unbounded; `{data, pagination}`
    /// envelope otherwise.
    pub fn into_response(self) -> serde_json::Value {
        if !self.bounded {
            return serde_json::to_value(&self.data).expect("instrument/tool payloads are always serializable");
        }

        let envelope = EnvelopedResponse {
            data: &self.data,
            pagination: PaginationInfo {
                from: self.from,
                limit: self.limit,
                total: self.total,
                returned: self.returned,
                has_more: self.has_more,
            },
        };
        serde_json::to_value(&envelope).expect("instrument/tool payloads are always serializable")
    }
}
