//! Scratch register pool.
//!
//! A fixed set of general purpose registers, each Free or Used. rax and rdx
//! stay out of the pool: rax carries return values and division results, rdx
//! the sign extension for `idiv`. Exhausting the pool is fatal for the
//! function being generated — spilling to memory is not implemented.

use crate::diagnostics::FatalError;

/// General Purpose Register 64-bit
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Register {
    Rbx,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
}

impl Register {
    pub const COUNT: usize = 7;

    /// Allocation order; first free wins
    pub const ALL: [Register; Self::COUNT] = [
        Self::Rbx,
        Self::R10,
        Self::R11,
        Self::R12,
        Self::R13,
        Self::R14,
        Self::R15,
    ];

    /// Low byte name, for byte-sized stores
    pub fn as_8_bit(self) -> &'static str {
        match self {
            Self::Rbx => "bl",
            Self::R10 => "r10b",
            Self::R11 => "r11b",
            Self::R12 => "r12b",
            Self::R13 => "r13b",
            Self::R14 => "r14b",
            Self::R15 => "r15b",
        }
    }

    fn pool_index(self) -> usize {
        Self::ALL
            .iter()
            .position(|&r| r == self)
            .expect("every register appears in ALL")
    }
}

#[derive(Debug)]
pub struct RegisterPool {
    used: [bool; Register::COUNT],
}

impl RegisterPool {
    pub fn new() -> Self {
        Self {
            used: [false; Register::COUNT],
        }
    }

    /// Marks the first Free register Used and returns it, or fails when the
    /// pool is exhausted. The caller turns the failure into
    /// [`FatalError::RegisterExhaustion`] with the function's name attached.
    pub fn alloc(&mut self) -> Option<Register> {
        let index = self.used.iter().position(|&used| !used)?;

        self.used[index] = true;
        Some(Register::ALL[index])
    }

    pub fn free(&mut self, register: Register) {
        let index = register.pool_index();

        debug_assert!(self.used[index], "freed a register that was not in use");
        self.used[index] = false;
    }

    pub fn is_used(&self, register: Register) -> bool {
        self.used[register.pool_index()]
    }

    pub fn used_count(&self) -> usize {
        self.used.iter().filter(|&&used| used).count()
    }

    pub fn none_used(&self) -> bool {
        self.used_count() == 0
    }

    /// Currently live registers, in pool order. Generated functions treat
    /// the whole pool as call-clobbered, so a call site must preserve every
    /// one of these across the `call`.
    pub fn live(&self) -> Vec<Register> {
        Register::ALL
            .into_iter()
            .filter(|r| self.is_used(*r))
            .collect()
    }
}

impl Default for RegisterPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience used by the code generator at every allocation site
pub fn alloc_or_exhausted(pool: &mut RegisterPool, function: &str) -> Result<Register, FatalError> {
    pool.alloc().ok_or_else(|| FatalError::RegisterExhaustion {
        function: function.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_first_free_in_pool_order() {
        let mut pool = RegisterPool::new();

        assert_eq!(pool.alloc(), Some(Register::Rbx));
        assert_eq!(pool.alloc(), Some(Register::R10));

        pool.free(Register::Rbx);
        assert_eq!(pool.alloc(), Some(Register::Rbx));
    }

    #[test]
    fn exhaustion_returns_none() {
        let mut pool = RegisterPool::new();

        for _ in 0..Register::COUNT {
            assert!(pool.alloc().is_some());
        }

        assert_eq!(pool.alloc(), None);
        assert_eq!(pool.used_count(), Register::COUNT);
    }

    #[test]
    fn exhaustion_is_fatal_with_the_function_name() {
        let mut pool = RegisterPool::new();

        while pool.alloc().is_some() {}

        let error = alloc_or_exhausted(&mut pool, "main").unwrap_err();
        assert_eq!(
            error,
            FatalError::RegisterExhaustion {
                function: "main".into()
            }
        );
    }

    #[test]
    fn freeing_returns_the_pool_to_empty() {
        let mut pool = RegisterPool::new();

        let a = pool.alloc().unwrap();
        let b = pool.alloc().unwrap();

        pool.free(a);
        pool.free(b);

        assert!(pool.none_used());
    }

    #[test]
    fn live_lists_used_registers_in_pool_order() {
        let mut pool = RegisterPool::new();

        let rbx = pool.alloc().unwrap();
        let r10 = pool.alloc().unwrap();

        assert_eq!(pool.live(), vec![rbx, r10]);

        pool.free(rbx);
        assert_eq!(pool.live(), vec![r10]);
    }

    #[test]
    fn register_names_render_lowercase() {
        assert_eq!(Register::Rbx.to_string(), "rbx");
        assert_eq!(Register::R15.to_string(), "r15");
        assert_eq!(Register::R10.as_8_bit(), "r10b");
    }
}
