//! Real-time priority elevation for worker threads
//!
//! Workers default to normal scheduling; hosts that run their own audio
//! thread at real-time priority can opt the workers into the same class
//! via the `realtime_workers` parameter. Elevation is best-effort: on
//! Linux SCHED_FIFO needs CAP_SYS_NICE (or an audio-group rtprio limit),
//! on macOS the time-constraint policy is applied to the calling thread.

/// Outcome of a priority elevation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityResult {
    /// Thread now runs in a real-time scheduling class
    Success,
    /// The platform refused (missing privileges); non-fatal
    Failed,
    /// No implementation for this platform
    Unsupported,
}

/// Promote the calling thread to a real-time scheduling class.
pub fn promote_current_thread() -> PriorityResult {
    platform_promote()
}

#[cfg(target_os = "linux")]
fn platform_promote() -> PriorityResult {
    use libc::{pthread_self, pthread_setschedparam, sched_param, SCHED_FIFO, SCHED_RR};

    // Priority 70 sits below typical audio-server threads (JACK uses
    // higher values for its own process thread) but above everything
    // non-realtime.
    let mut param = sched_param { sched_priority: 70 };
    let thread = unsafe { pthread_self() };

    if unsafe { pthread_setschedparam(thread, SCHED_FIFO, &param) } == 0 {
        return PriorityResult::Success;
    }

    // SCHED_RR as fallback; some rtprio limits only allow it
    param.sched_priority = 60;
    if unsafe { pthread_setschedparam(thread, SCHED_RR, &param) } == 0 {
        return PriorityResult::Success;
    }

    PriorityResult::Failed
}

#[cfg(target_os = "macos")]
fn platform_promote() -> PriorityResult {
    use std::mem::MaybeUninit;

    const THREAD_TIME_CONSTRAINT_POLICY: u32 = 2;
    const THREAD_TIME_CONSTRAINT_POLICY_COUNT: u32 = 4;

    #[repr(C)]
    struct ThreadTimeConstraintPolicy {
        period: u32,
        computation: u32,
        constraint: u32,
        preemptible: i32,
    }

    #[repr(C)]
    struct MachTimebaseInfo {
        numer: u32,
        denom: u32,
    }

    extern "C" {
        fn mach_thread_self() -> u32;
        fn mach_timebase_info(info: *mut MachTimebaseInfo) -> i32;
        fn thread_policy_set(
            thread: u32,
            flavor: u32,
            policy_info: *const ThreadTimeConstraintPolicy,
            count: u32,
        ) -> i32;
    }

    let timebase = unsafe {
        let mut info = MaybeUninit::<MachTimebaseInfo>::uninit();
        mach_timebase_info(info.as_mut_ptr());
        info.assume_init()
    };
    let ns_to_abs =
        |ns: u64| -> u32 { ((ns * timebase.denom as u64) / timebase.numer as u64) as u32 };

    // Tuned for block-rate work: 1ms period, 500µs computation budget.
    let policy = ThreadTimeConstraintPolicy {
        period: ns_to_abs(1_000_000),
        computation: ns_to_abs(500_000),
        constraint: ns_to_abs(1_000_000),
        preemptible: 1,
    };

    let status = unsafe {
        thread_policy_set(
            mach_thread_self(),
            THREAD_TIME_CONSTRAINT_POLICY,
            &policy,
            THREAD_TIME_CONSTRAINT_POLICY_COUNT,
        )
    };

    if status == 0 {
        PriorityResult::Success
    } else {
        PriorityResult::Failed
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn platform_promote() -> PriorityResult {
    PriorityResult::Unsupported
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promotion_reports_a_defined_outcome() {
        // Succeeds only with the right privileges; must never panic.
        let result = promote_current_thread();
        assert!(matches!(
            result,
            PriorityResult::Success | PriorityResult::Failed | PriorityResult::Unsupported
        ));
    }
}
