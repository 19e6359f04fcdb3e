use crate::error::{Result, SocialError};

/// A validated 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
	page: u32,
	size: u32,
}

impl PageRequest {
	pub fn new(page: u32, size: u32) -> Result<Self> {
		if page == 0 {
			return Err(SocialError::invalid("page", "page must be at least 1"));
		}

		if size == 0 {
			return Err(SocialError::invalid("size", "size must be at least 1"));
		}

		Ok(Self { page, size })
	}

	pub fn page(&self) -> u32 {
		self.page
	}

	pub fn size(&self) -> u32 {
		self.size
	}

	/// Rows to skip: `(page - 1) * size`.
	pub fn offset(&self) -> u64 {
		u64::from(self.page - 1) * u64::from(self.size)
	}

	pub fn limit(&self) -> u64 {
		u64::from(self.size)
	}

	/// `ceil(total / size)`, which is 0 for an empty result.
	pub fn total_pages(&self, total: u64) -> u64 {
		total.div_ceil(u64::from(self.size))
	}
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Paginated<T> {
	pub total_pages: u64,
	pub items: Vec<T>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_rejects_zero() {
		assert!(matches!(
			PageRequest::new(0, 10),
			Err(SocialError::InvalidArgument { field: "page", .. })
		));
		assert!(matches!(
			PageRequest::new(1, 0),
			Err(SocialError::InvalidArgument { field: "size", .. })
		));
	}

	#[test]
	fn test_total_pages() {
		let page = PageRequest::new(1, 3).unwrap();
		assert_eq!(page.total_pages(0), 0);
		assert_eq!(page.total_pages(1), 1);
		assert_eq!(page.total_pages(6), 2);
		assert_eq!(page.total_pages(7), 3);
	}

	#[test]
	fn test_offset() {
		assert_eq!(PageRequest::new(1, 3).unwrap().offset(), 0);
		assert_eq!(PageRequest::new(3, 3).unwrap().offset(), 6);
		assert_eq!(PageRequest::new(u32::MAX, u32::MAX).unwrap().offset(), u64::from(u32::MAX - 1) * u64::from(u32::MAX));
	}
}
