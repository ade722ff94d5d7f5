//! Periodic GPIO sampling tick using ESP-IDF's esp_timer API.
//!
//! Every [`TICK_PERIOD_MS`] the timer task runs one [`PinSampler::tick`]:
//! all monitored inputs are read, debounced and committed actions land in
//! the shared pending table the main loop drains.
//!
//! Timer callbacks execute in the ESP timer task context (not ISR). The
//! sampler is owned by the callback and touches nothing but atomics.

use crate::gpio::PinSampler;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

pub const TICK_PERIOD_MS: u64 = 100;

#[cfg(target_os = "espidf")]
static mut GPIO_TIMER: esp_timer_handle_t = core::ptr::null_mut();

#[cfg(target_os = "espidf")]
unsafe extern "C" fn gpio_tick_cb(arg: *mut core::ffi::c_void) {
    // SAFETY: `arg` is the leaked sampler from `start_gpio_tick`; only this
    // callback dereferences it and esp_timer never runs it concurrently.
    let sampler = unsafe { &mut *arg.cast::<PinSampler>() };
    let now_ms = crate::adapters::time::millis() as u32;
    sampler.tick(now_ms, super::hw_init::read_level);
}

/// Start the 10 Hz sampling timer. The sampler lives for the rest of the
/// program.
#[cfg(target_os = "espidf")]
pub fn start_gpio_tick(sampler: PinSampler) -> bool {
    let arg = Box::into_raw(Box::new(sampler));
    // SAFETY: GPIO_TIMER is written here once at boot from the main task
    // before the callback can fire.
    unsafe {
        let args = esp_timer_create_args_t {
            callback: Some(gpio_tick_cb),
            arg: arg.cast(),
            dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
            name: c"gpio_tick".as_ptr(),
            skip_unhandled_events: true,
        };
        let ret = esp_timer_create(&args, &raw mut GPIO_TIMER);
        if ret != ESP_OK {
            log::error!("hw_timer: gpio timer create failed (rc={})", ret);
            drop(Box::from_raw(arg));
            return false;
        }
        let ret = esp_timer_start_periodic(GPIO_TIMER, TICK_PERIOD_MS * 1000);
        if ret != ESP_OK {
            log::error!("hw_timer: gpio timer start failed (rc={})", ret);
            return false;
        }
    }
    log::info!("hw_timer: gpio tick @{}ms started", TICK_PERIOD_MS);
    true
}

#[cfg(not(target_os = "espidf"))]
pub fn start_gpio_tick(sampler: PinSampler) -> bool {
    drop(sampler);
    log::info!("hw_timer(sim): gpio tick not started (tests tick the sampler directly)");
    false
}
