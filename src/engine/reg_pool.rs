use crate::instructions::{RegClass, REG_CLASS_COUNT};

// Free count of the sentinel class; large enough that invalid destinations
// never gate renaming.
pub(crate) const UNLIMITED_REGS: u32 = 262144;

/// Free-register tracker per register class, the renaming gate at dispatch.
/// Under mis-path tracking, wrong-path (fake) instructions are charged to a
/// shadow pool instead of the real one; the admission check then compares
/// against `real - shadow` so wrong-path pressure still throttles dispatch.
pub(crate) struct RegPool {
    pool: [u32; REG_CLASS_COUNT],
    shadow: [u32; REG_CLASS_COUNT],
    track_mispath: bool,
}

impl RegPool {
    pub(crate) fn new(int_regs: u32, fp_regs: u32, track_mispath: bool) -> RegPool {
        RegPool {
            pool: [int_regs, fp_regs, UNLIMITED_REGS],
            shadow: [0; REG_CLASS_COUNT],
            track_mispath,
        }
    }

    pub(crate) fn has_free(&self, class: RegClass) -> bool {
        let c = class as usize;
        if self.track_mispath {
            self.pool[c] > self.shadow[c]
        } else {
            self.pool[c] > 0
        }
    }

    pub(crate) fn free_count(&self, class: RegClass) -> u32 {
        self.pool[class as usize]
    }

    pub(crate) fn shadow_count(&self, class: RegClass) -> u32 {
        self.shadow[class as usize]
    }

    pub(crate) fn alloc(&mut self, class: RegClass, fake: bool) {
        let c = class as usize;
        if fake {
            // fakes never hold real registers; without tracking they are not
            // counted at all
            if self.track_mispath {
                self.shadow[c] += 1;
            }
            return;
        }

        assert!(self.pool[c] > 0, "register pool {:?} underflow", class);
        self.pool[c] -= 1;
    }

    pub(crate) fn release(&mut self, class: RegClass) {
        self.pool[class as usize] += 1;
    }

    /// Wrong-path resolution: every shadow allocation is abandoned at once.
    pub(crate) fn clear_shadow(&mut self) {
        self.shadow = [0; REG_CLASS_COUNT];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_release_round_trip() {
        let mut pool = RegPool::new(16, 16, false);
        assert_eq!(pool.free_count(RegClass::Int), 16);

        pool.alloc(RegClass::Int, false);
        assert_eq!(pool.free_count(RegClass::Int), 15);

        pool.release(RegClass::Int);
        assert_eq!(pool.free_count(RegClass::Int), 16);
    }

    #[test]
    fn test_exhaustion_gates_has_free() {
        let mut pool = RegPool::new(16, 16, false);
        for _ in 0..16 {
            assert!(pool.has_free(RegClass::Fp));
            pool.alloc(RegClass::Fp, false);
        }
        assert!(!pool.has_free(RegClass::Fp));
        assert!(pool.has_free(RegClass::Int));
    }

    #[test]
    fn test_sentinel_class_never_exhausts() {
        let mut pool = RegPool::new(16, 16, false);
        for _ in 0..1000 {
            assert!(pool.has_free(RegClass::None));
            pool.alloc(RegClass::None, false);
        }
    }

    #[test]
    fn test_fake_goes_to_shadow_pool() {
        let mut pool = RegPool::new(16, 16, true);
        pool.alloc(RegClass::Int, true);
        assert_eq!(pool.free_count(RegClass::Int), 16);
        assert_eq!(pool.shadow_count(RegClass::Int), 1);

        pool.clear_shadow();
        assert_eq!(pool.shadow_count(RegClass::Int), 0);
    }

    #[test]
    fn test_shadow_pressure_throttles() {
        let mut pool = RegPool::new(16, 16, true);
        for _ in 0..16 {
            pool.alloc(RegClass::Int, true);
        }
        assert!(!pool.has_free(RegClass::Int));
        assert_eq!(pool.free_count(RegClass::Int), 16);
    }
}
