use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use embedded_hal::digital::{self, OutputPin};
use embedded_hal::spi::{self, ErrorType, Operation, SpiBus, SpiDevice};

/// 共享SPI设备错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SharedSpiError {
    /// SPI外设读写失败
    #[error("SPI总线读写失败: {0:?}")]
    Bus(spi::ErrorKind),
    /// 片选引脚操作失败
    #[error("片选引脚操作失败: {0:?}")]
    ChipSelect(digital::ErrorKind),
    /// 其他线程持锁时崩溃，总线状态不可信
    #[error("SPI通信总线锁已失效")]
    Poisoned,
}

impl spi::Error for SharedSpiError {
    fn kind(&self) -> spi::ErrorKind {
        match self {
            Self::Bus(kind) => *kind,
            Self::ChipSelect(_) => spi::ErrorKind::ChipSelectFault,
            Self::Poisoned => spi::ErrorKind::Other,
        }
    }
}

/// 多个传感器共用一个SPI外设
///
/// 总线放在 `Arc<Mutex<_>>` 中，每个设备持有自己的片选引脚。
/// 一次 `transaction` 期间持有总线锁并拉低片选，结束后释放，
/// 与I2C传感器共享 `Arc<Mutex<I2c>>` 的方式一致。
pub struct SharedSpiDevice<BUS, CS> {
    /// SPI总线句柄
    bus: Arc<Mutex<BUS>>,
    /// 片选引脚（低电平有效）
    cs: CS,
}

impl<BUS, CS> SharedSpiDevice<BUS, CS>
where
    BUS: SpiBus,
    CS: OutputPin,
{
    /// 构建设备实例，片选先置高
    pub fn new(bus: Arc<Mutex<BUS>>, mut cs: CS) -> Result<Self, SharedSpiError> {
        cs.set_high().map_err(|err| SharedSpiError::ChipSelect(digital::Error::kind(&err)))?;
        Ok(Self { bus, cs })
    }

    /// 取回总线句柄与片选引脚
    pub fn release(self) -> (Arc<Mutex<BUS>>, CS) {
        (self.bus, self.cs)
    }

    /// 忙等待，纳秒级延时 `thread::sleep` 的精度不够
    fn wait(duration: Duration) {
        let start = Instant::now();
        while start.elapsed() < duration {}
    }

    fn run(bus: &mut BUS, operations: &mut [Operation<'_, u8>]) -> Result<(), BUS::Error> {
        for operation in operations {
            match operation {
                Operation::Read(buf) => bus.read(buf)?,
                Operation::Write(buf) => bus.write(buf)?,
                Operation::Transfer(read, write) => bus.transfer(read, write)?,
                Operation::TransferInPlace(buf) => bus.transfer_in_place(buf)?,
                Operation::DelayNs(ns) => {
                    bus.flush()?;
                    Self::wait(Duration::from_nanos(*ns as u64));
                }
            }
        }
        bus.flush()
    }
}

impl<BUS, CS> ErrorType for SharedSpiDevice<BUS, CS>
where
    BUS: SpiBus,
    CS: OutputPin,
{
    type Error = SharedSpiError;
}

impl<BUS, CS> SpiDevice for SharedSpiDevice<BUS, CS>
where
    BUS: SpiBus,
    CS: OutputPin,
{
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        // 获取SPI总线通信权限
        let mut bus = self.bus.lock().map_err(|_| SharedSpiError::Poisoned)?;

        // 选中设备
        self.cs
            .set_low()
            .map_err(|err| SharedSpiError::ChipSelect(digital::Error::kind(&err)))?;

        let result = Self::run(&mut bus, operations);

        // 无论读写是否成功都要释放片选
        let deselect = self.cs.set_high();

        result.map_err(|err| SharedSpiError::Bus(spi::Error::kind(&err)))?;
        deselect.map_err(|err| SharedSpiError::ChipSelect(digital::Error::kind(&err)))
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;

    /// 记录片选变化与总线操作
    #[derive(Default)]
    struct Trace {
        events: Vec<String>,
    }

    struct FakeBus {
        trace: Arc<Mutex<Trace>>,
        reply: u8,
        fail: bool,
    }

    impl ErrorType for FakeBus {
        type Error = spi::ErrorKind;
    }

    impl SpiBus for FakeBus {
        fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
            if self.fail {
                return Err(spi::ErrorKind::Overrun);
            }
            words.fill(self.reply);
            self.trace.lock().unwrap().events.push(format!("read {}", words.len()));
            Ok(())
        }

        fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
            self.trace.lock().unwrap().events.push(format!("write {:02x?}", words));
            Ok(())
        }

        fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
            self.write(write)?;
            self.read(read)
        }

        fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
            self.read(words)
        }

        fn flush(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    struct FakeCs {
        trace: Arc<Mutex<Trace>>,
        name: &'static str,
    }

    impl digital::ErrorType for FakeCs {
        type Error = Infallible;
    }

    impl OutputPin for FakeCs {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.trace.lock().unwrap().events.push(format!("{} low", self.name));
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.trace.lock().unwrap().events.push(format!("{} high", self.name));
            Ok(())
        }
    }

    fn shared_bus(fail: bool) -> (Arc<Mutex<Trace>>, Arc<Mutex<FakeBus>>) {
        let trace = Arc::new(Mutex::new(Trace::default()));
        let bus = Arc::new(Mutex::new(FakeBus {
            trace: trace.clone(),
            reply: 0x60,
            fail,
        }));
        (trace, bus)
    }

    #[test]
    fn transaction_is_framed_by_chip_select() {
        let (trace, bus) = shared_bus(false);
        let cs = FakeCs {
            trace: trace.clone(),
            name: "cs",
        };
        let mut device = SharedSpiDevice::new(bus, cs).unwrap();

        let mut buf = [0u8; 1];
        device
            .transaction(&mut [Operation::Write(&[0xD0]), Operation::Read(&mut buf)])
            .unwrap();

        assert_eq!(buf, [0x60]);
        assert_eq!(
            trace.lock().unwrap().events,
            vec!["cs high", "cs low", "write [d0]", "read 1", "cs high"]
        );
    }

    #[test]
    fn two_devices_share_one_bus() {
        let (trace, bus) = shared_bus(false);
        let mut first = SharedSpiDevice::new(
            bus.clone(),
            FakeCs {
                trace: trace.clone(),
                name: "cs0",
            },
        )
        .unwrap();
        let mut second = SharedSpiDevice::new(
            bus,
            FakeCs {
                trace: trace.clone(),
                name: "cs1",
            },
        )
        .unwrap();

        first.transaction(&mut [Operation::Write(&[0x74, 0x57])]).unwrap();
        second.transaction(&mut [Operation::Write(&[0x75, 0x10])]).unwrap();

        assert_eq!(
            trace.lock().unwrap().events[2..],
            ["cs0 low", "write [74, 57]", "cs0 high", "cs1 low", "write [75, 10]", "cs1 high"]
        );
    }

    #[test]
    fn chip_select_is_released_after_bus_failure() {
        let (trace, bus) = shared_bus(true);
        let cs = FakeCs {
            trace: trace.clone(),
            name: "cs",
        };
        let mut device = SharedSpiDevice::new(bus, cs).unwrap();

        let mut buf = [0u8; 2];
        let result = device.transaction(&mut [Operation::Read(&mut buf)]);

        assert_eq!(result, Err(SharedSpiError::Bus(spi::ErrorKind::Overrun)));
        assert_eq!(trace.lock().unwrap().events.last().map(String::as_str), Some("cs high"));
    }
}
