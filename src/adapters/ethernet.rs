//! Wired Ethernet transport (W5500 over SPI, LAN8720 over RMII).
//!
//! [`EthernetTransport`] implements [`NetworkTransport`] on top of an
//! [`EthLink`]: the started ESP-IDF Ethernet stack on the device, or any
//! stand-in on the host. A board whose controller never came up is built
//! with no link at all; every reconnect attempt then reports
//! [`ReconnectStatus::CriticalFailure`] so the connectivity manager can
//! reboot onto Wi-Fi.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: [`create_link`] brings up the controller
//!   selected by [`NetworkHardware`] through `esp_idf_svc::eth`. RMII is
//!   only wired on the original ESP32.
//! - **all other targets**: links are supplied by the caller.

use core::net::Ipv4Addr;

use log::{error, info, warn};

use crate::app::ports::{NetworkTransport, ReconnectStatus};
use crate::pins::NetworkHardware;

/// Started Ethernet interface, as seen by the transport.
pub trait EthLink {
    /// Start (or restart) the MAC/PHY. `false` when the driver refuses.
    fn start(&mut self) -> bool;

    /// Cable plugged, link negotiated and an address assigned.
    fn is_up(&self) -> bool;

    fn address(&self) -> Option<Ipv4Addr>;
}

pub struct EthernetTransport {
    hardware: NetworkHardware,
    link: Option<Box<dyn EthLink>>,
    started: bool,
    was_connected: bool,
}

impl EthernetTransport {
    /// `link` is `None` when the controller could not be initialised.
    pub fn new(hardware: NetworkHardware, link: Option<Box<dyn EthLink>>) -> Self {
        if link.is_none() {
            error!("Ethernet: no usable {} controller", hardware.name());
        }
        Self {
            hardware,
            link,
            started: false,
            was_connected: false,
        }
    }

    pub fn hardware(&self) -> NetworkHardware {
        self.hardware
    }

    pub fn has_controller(&self) -> bool {
        self.link.is_some()
    }
}

impl NetworkTransport for EthernetTransport {
    fn device_name(&self) -> &str {
        self.hardware.name()
    }

    fn update(&mut self) {
        let connected = self.is_connected();
        if connected != self.was_connected {
            self.was_connected = connected;
            if connected {
                info!("Ethernet: link up ({})", self.hardware.name());
            } else {
                warn!("Ethernet: link down");
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.link.as_ref().is_some_and(|link| link.is_up())
    }

    fn attempt_reconnect(&mut self) -> ReconnectStatus {
        let Some(link) = self.link.as_mut() else {
            return ReconnectStatus::CriticalFailure;
        };
        if !self.started {
            if !link.start() {
                error!("Ethernet: {} failed to start", self.hardware.name());
                return ReconnectStatus::CriticalFailure;
            }
            self.started = true;
        }
        if link.is_up() {
            ReconnectStatus::Success
        } else {
            ReconnectStatus::Failure
        }
    }

    fn signal_strength(&self) -> Option<i8> {
        None
    }

    fn local_address(&self) -> Option<Ipv4Addr> {
        self.link.as_ref().and_then(|link| link.address())
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF controller bring-up
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use esp::{EthResources, create_link};
#[cfg(all(target_os = "espidf", not(any(esp32s3, esp32c3))))]
pub use esp::RmiiPins;

#[cfg(target_os = "espidf")]
mod esp {
    use core::net::Ipv4Addr;

    use esp_idf_hal::gpio::AnyIOPin;
    use esp_idf_hal::spi::{SPI2, SpiDriver, SpiDriverConfig};
    use esp_idf_hal::units::FromValueType;
    use esp_idf_svc::eth::{EspEth, EthDriver, SpiEth, SpiEthChipset};
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use log::{error, info};

    use super::EthLink;
    use crate::pins::{self, NetworkHardware};

    /// Peripherals the Ethernet controllers need. Only one transport is
    /// brought up per boot, so these are handed over whole.
    pub struct EthResources {
        pub spi: SPI2,
        #[cfg(not(any(esp32s3, esp32c3)))]
        pub mac: esp_idf_hal::mac::MAC,
        #[cfg(not(any(esp32s3, esp32c3)))]
        pub rmii: RmiiPins,
    }

    #[cfg(not(any(esp32s3, esp32c3)))]
    pub struct RmiiPins {
        pub rxd0: esp_idf_hal::gpio::Gpio25,
        pub rxd1: esp_idf_hal::gpio::Gpio26,
        pub crs_dv: esp_idf_hal::gpio::Gpio27,
        pub txd1: esp_idf_hal::gpio::Gpio22,
        pub tx_en: esp_idf_hal::gpio::Gpio21,
        pub txd0: esp_idf_hal::gpio::Gpio19,
        pub clk_in: esp_idf_hal::gpio::Gpio0,
        pub clk_out: esp_idf_hal::gpio::Gpio17,
    }

    #[cfg(not(any(esp32s3, esp32c3)))]
    impl RmiiPins {
        /// The fixed EMAC pins of the ESP32.
        pub fn take(pins: esp_idf_hal::gpio::Pins) -> Self {
            Self {
                rxd0: pins.gpio25,
                rxd1: pins.gpio26,
                crs_dv: pins.gpio27,
                txd1: pins.gpio22,
                tx_en: pins.gpio21,
                txd0: pins.gpio19,
                clk_in: pins.gpio0,
                clk_out: pins.gpio17,
            }
        }
    }

    type SpiLink = EspEth<'static, EthDriver<'static, SpiEth<SpiDriver<'static>>>>;

    impl EthLink for SpiLink {
        fn start(&mut self) -> bool {
            EspEth::start(self).is_ok()
        }

        fn is_up(&self) -> bool {
            EspEth::is_connected(self).unwrap_or(false) && self.netif().is_up().unwrap_or(false)
        }

        fn address(&self) -> Option<Ipv4Addr> {
            let info = self.netif().get_ip_info().ok()?;
            (!info.ip.is_unspecified()).then_some(info.ip)
        }
    }

    #[cfg(not(any(esp32s3, esp32c3)))]
    type RmiiLink = EspEth<'static, EthDriver<'static, esp_idf_svc::eth::RmiiEth>>;

    #[cfg(not(any(esp32s3, esp32c3)))]
    impl EthLink for RmiiLink {
        fn start(&mut self) -> bool {
            EspEth::start(self).is_ok()
        }

        fn is_up(&self) -> bool {
            EspEth::is_connected(self).unwrap_or(false) && self.netif().is_up().unwrap_or(false)
        }

        fn address(&self) -> Option<Ipv4Addr> {
            let info = self.netif().get_ip_info().ok()?;
            (!info.ip.is_unspecified()).then_some(info.ip)
        }
    }

    /// Create the driver for `hardware`. `None` when the driver could not
    /// be created (controller absent or miswired). The transport starts it.
    pub fn create_link(
        hardware: NetworkHardware,
        resources: EthResources,
        sysloop: EspSystemEventLoop,
    ) -> Option<Box<dyn EthLink>> {
        let result: Result<Box<dyn EthLink>, esp_idf_svc::sys::EspError> = match hardware {
            NetworkHardware::Wifi => return None,
            NetworkHardware::W5500 => spi_link(
                resources.spi,
                [pins::W5500_SCK, pins::W5500_MOSI, pins::W5500_MISO],
                pins::W5500_CS,
                Some(pins::W5500_IRQ),
                Some(pins::W5500_RST),
                sysloop,
            ),
            NetworkHardware::M5AtomPoe => spi_link(
                resources.spi,
                [pins::M5_W5500_SCK, pins::M5_W5500_MOSI, pins::M5_W5500_MISO],
                pins::M5_W5500_CS,
                None,
                None,
                sysloop,
            ),
            #[cfg(not(any(esp32s3, esp32c3)))]
            NetworkHardware::Lan8720Olimex => {
                rmii_link(resources.mac, resources.rmii, pins::OLIMEX_PHY_POWER, true, sysloop)
            }
            #[cfg(not(any(esp32s3, esp32c3)))]
            NetworkHardware::Lan8720Wt32Eth01 => {
                rmii_link(resources.mac, resources.rmii, pins::WT32_PHY_POWER, false, sysloop)
            }
            #[cfg(any(esp32s3, esp32c3))]
            NetworkHardware::Lan8720Olimex | NetworkHardware::Lan8720Wt32Eth01 => {
                error!("Ethernet: RMII is not available on this chip");
                return None;
            }
        };

        match result {
            Ok(link) => {
                info!("Ethernet: {} driver ready", hardware.name());
                Some(link)
            }
            Err(e) => {
                error!("Ethernet: {} driver init failed: {}", hardware.name(), e);
                None
            }
        }
    }

    fn io(pin: u8) -> AnyIOPin {
        // SAFETY: reserved transport pins are never handed out as user GPIO.
        unsafe { AnyIOPin::new(i32::from(pin)) }
    }

    fn spi_link(
        spi: SPI2,
        [sck, mosi, miso]: [u8; 3],
        cs: u8,
        irq: Option<u8>,
        rst: Option<u8>,
        sysloop: EspSystemEventLoop,
    ) -> Result<Box<dyn EthLink>, esp_idf_svc::sys::EspError> {
        let bus = SpiDriver::new(spi, io(sck), io(mosi), Some(io(miso)), &SpiDriverConfig::new())?;
        let driver = EthDriver::new_spi(
            bus,
            irq.map(io),
            Some(io(cs)),
            rst.map(io),
            SpiEthChipset::W5500,
            20_u32.MHz().into(),
            None,
            None,
            sysloop,
        )?;
        Ok(Box::new(EspEth::wrap(driver)?))
    }

    #[cfg(not(any(esp32s3, esp32c3)))]
    fn rmii_link(
        mac: esp_idf_hal::mac::MAC,
        rmii: RmiiPins,
        power_pin: u8,
        clock_out: bool,
        sysloop: EspSystemEventLoop,
    ) -> Result<Box<dyn EthLink>, esp_idf_svc::sys::EspError> {
        use esp_idf_hal::gpio::{Gpio0, Gpio16, Gpio17};
        use esp_idf_svc::eth::{RmiiClockConfig, RmiiEthChipset};

        power_phy(power_pin);

        let clock: RmiiClockConfig<Gpio0, Gpio16, Gpio17> = if clock_out {
            RmiiClockConfig::OutputInvertedGpio17(rmii.clk_out)
        } else {
            RmiiClockConfig::Input(rmii.clk_in)
        };
        let driver = EthDriver::new_rmii(
            mac,
            rmii.rxd0,
            rmii.rxd1,
            rmii.crs_dv,
            io(pins::LAN8720_MDC),
            rmii.txd1,
            rmii.tx_en,
            rmii.txd0,
            io(pins::LAN8720_MDIO),
            clock,
            Option::<AnyIOPin>::None,
            RmiiEthChipset::LAN87XX,
            Some(pins::LAN8720_PHY_ADDR),
            sysloop,
        )?;
        Ok(Box::new(EspEth::wrap(driver)?))
    }

    /// Drive the PHY power enable high and give the oscillator time to settle.
    #[cfg(not(any(esp32s3, esp32c3)))]
    fn power_phy(pin: u8) {
        use esp_idf_svc::sys::{gpio_mode_t_GPIO_MODE_OUTPUT, gpio_set_direction, gpio_set_level};
        // SAFETY: plain register writes on a pin owned by the transport.
        unsafe {
            gpio_set_direction(i32::from(pin), gpio_mode_t_GPIO_MODE_OUTPUT);
            gpio_set_level(i32::from(pin), 1);
        }
        esp_idf_hal::delay::FreeRtos::delay_ms(10);
    }
}
