use crate::error::DispatchError;

// Always works in byte counts

pub struct MemoryTracker {
    maximum: u64,
    current: u64,
}

impl MemoryTracker {
    pub fn new(maximum: u64) -> Self {
        Self {
            maximum,
            current: 0,
        }
    }

    pub fn unlimited() -> Self {
        Self::new(u64::MAX)
    }

    pub fn allocate(&mut self, size: u64) -> Result<(), DispatchError> {
        let new_usage = match self.current.checked_add(size) {
            Some(usage) => usage,
            None => {
                return Err(DispatchError::OutOfMemory(format!(
                    "Memory allocation would overflow: current {} + size {}",
                    self.current, size
                )))
            }
        };
        if new_usage > self.maximum {
            return Err(DispatchError::OutOfMemory(format!(
                "Tried to allocate {} bytes when {} of {} bytes are used",
                size, self.current, self.maximum
            )));
        }
        self.current = new_usage;
        Ok(())
    }

    pub fn deallocate(&mut self, size: u64) {
        self.current = self.current.saturating_sub(size);
    }

    pub fn get_current(&self) -> u64 {
        self.current
    }
}
