//! Reusable receive buffers.
//!
//! Each [`Transport`](crate::transport::Transport) owns its own [`BufferPool`]. A
//! [`PooledBuffer`] goes back to the pool when it is dropped, and the borrow checker
//! guarantees no slice into it outlives that, so anything handed to a caller has to be
//! copied out first.

use std::{
	ops::{Deref, DerefMut},
	sync::{Arc, Mutex},
};

/// Size of every pooled buffer: large enough for jumbo-frame mDNS payloads.
pub const RECV_BUFFER_SIZE: usize = 9000;

type Buffer = Box<[u8; RECV_BUFFER_SIZE]>;

/// A buffer borrowed from a [`BufferPool`], returned to it on drop.
pub struct PooledBuffer {
	buffer: Option<Buffer>,
	pool: Arc<Mutex<Vec<Buffer>>>,
}
impl Deref for PooledBuffer {
	type Target = [u8; RECV_BUFFER_SIZE];

	#[inline(always)]
	fn deref(&self) -> &Self::Target {
		// Only taken in `drop`
		self.buffer.as_deref().unwrap()
	}
}
impl DerefMut for PooledBuffer {
	#[inline(always)]
	fn deref_mut(&mut self) -> &mut Self::Target {
		self.buffer.as_deref_mut().unwrap()
	}
}
impl Drop for PooledBuffer {
	fn drop(&mut self) {
		if let Some(buffer) = self.buffer.take() {
			if let Ok(mut pool) = self.pool.lock() {
				pool.push(buffer);
			}
		}
	}
}

/// A thread-safe pool of fixed-size receive buffers.
pub struct BufferPool {
	pool: Arc<Mutex<Vec<Buffer>>>,
}
impl BufferPool {
	/// Creates a pool with `prealloc` buffers ready to go.
	pub fn new(prealloc: usize) -> Self {
		Self {
			pool: Arc::new(Mutex::new((0..prealloc).map(|_| new_buffer()).collect())),
		}
	}

	/// Takes a buffer from the pool, allocating a new one only if the pool is empty.
	pub fn acquire(&self) -> PooledBuffer {
		let buffer = self.pool.lock().ok().and_then(|mut pool| pool.pop()).unwrap_or_else(new_buffer);

		PooledBuffer {
			buffer: Some(buffer),
			pool: self.pool.clone(),
		}
	}

	/// Number of idle buffers in the pool.
	pub fn available(&self) -> usize {
		self.pool.lock().map(|pool| pool.len()).unwrap_or(0)
	}
}
impl Default for BufferPool {
	fn default() -> Self {
		Self::new(1)
	}
}

fn new_buffer() -> Buffer {
	// Allocate straight onto the heap rather than building the array on the stack first
	vec![0u8; RECV_BUFFER_SIZE].into_boxed_slice().try_into().unwrap_or_else(|_| unreachable!())
}
