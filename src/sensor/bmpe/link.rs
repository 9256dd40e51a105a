use std::fmt::Debug;

use embedded_hal::digital::{self, Error as _, InputPin, OutputPin, PinState};
use embedded_hal::spi::{Operation, SpiDevice};

/// SPI链路能力接口
///
/// 一次 `exchange` 就是一帧完整的寄存器访问：
/// 片选拉低 -> 发送命令字节 -> 发送 `write` 负载 -> 读入 `read` 负载 -> 片选拉高。
/// 片选和总线独占都在帧内完成，调用方无需关心。
pub trait SpiLink {
    type Error: Debug;

    fn exchange(&mut self, command: u8, write: &[u8], read: &mut [u8]) -> Result<(), Self::Error>;
}

/// 硬件SPI外设链路
///
/// 整帧映射为一次 `SpiDevice::transaction`，片选与总线的获取/释放
/// 由 `SpiDevice` 的实现（例如 [`crate::shared_spi::SharedSpiDevice`]）负责。
pub struct HardwareSpi<D> {
    device: D,
}

impl<D: SpiDevice> HardwareSpi<D> {
    pub fn new(device: D) -> Self {
        Self { device }
    }

    /// 取回底层 SPI 设备
    pub fn release(self) -> D {
        self.device
    }
}

impl<D: SpiDevice> SpiLink for HardwareSpi<D> {
    type Error = D::Error;

    fn exchange(&mut self, command: u8, write: &[u8], read: &mut [u8]) -> Result<(), Self::Error> {
        let command = [command];
        // 空负载不产生操作，保证一帧内只有实际需要的传输
        match (write.is_empty(), read.is_empty()) {
            (true, true) => self.device.transaction(&mut [Operation::Write(&command)]),
            (false, true) => self
                .device
                .transaction(&mut [Operation::Write(&command), Operation::Write(write)]),
            (true, false) => self
                .device
                .transaction(&mut [Operation::Write(&command), Operation::Read(read)]),
            (false, false) => self.device.transaction(&mut [
                Operation::Write(&command),
                Operation::Write(write),
                Operation::Read(read),
            ]),
        }
    }
}

/// 软件模拟（位操作）SPI链路，模式0，高位先出
///
/// 与硬件外设在协议层面等价，但时序完全取决于 GPIO 的翻转速度，只适合调试。
pub struct BitBangSpi<CS, SCK, MOSI, MISO> {
    cs: CS,
    sck: SCK,
    mosi: MOSI,
    miso: MISO,
}

impl<CS, SCK, MOSI, MISO> BitBangSpi<CS, SCK, MOSI, MISO>
where
    CS: OutputPin,
    SCK: OutputPin,
    MOSI: OutputPin,
    MISO: InputPin,
{
    /// 构建链路实例
    ///
    /// - 片选先置高（不选中设备），时钟与数据输出线置低
    pub fn new(mut cs: CS, mut sck: SCK, mut mosi: MOSI, miso: MISO) -> Result<Self, digital::ErrorKind> {
        cs.set_high().map_err(|err| err.kind())?;
        sck.set_low().map_err(|err| err.kind())?;
        mosi.set_low().map_err(|err| err.kind())?;

        Ok(Self { cs, sck, mosi, miso })
    }

    /// 取回全部引脚
    pub fn release(self) -> (CS, SCK, MOSI, MISO) {
        (self.cs, self.sck, self.mosi, self.miso)
    }

    /// 移出一个字节的同时移入一个字节
    fn shift(&mut self, byte: u8) -> Result<u8, digital::ErrorKind> {
        let mut reply = 0u8;

        for bit in (0..8).rev() {
            reply <<= 1;
            // 时钟拉低后再改变数据线，从机在上升沿采样
            self.sck.set_low().map_err(|err| err.kind())?;
            self.mosi
                .set_state(PinState::from(byte & (1 << bit) != 0))
                .map_err(|err| err.kind())?;
            self.sck.set_high().map_err(|err| err.kind())?;

            if self.miso.is_high().map_err(|err| err.kind())? {
                reply |= 1;
            }
        }

        Ok(reply)
    }

    /// 片选有效期间的全部移位
    fn frame(&mut self, command: u8, write: &[u8], read: &mut [u8]) -> Result<(), digital::ErrorKind> {
        self.shift(command)?;
        for byte in write {
            self.shift(*byte)?;
        }
        for slot in read.iter_mut() {
            *slot = self.shift(0)?;
        }

        Ok(())
    }
}

impl<CS, SCK, MOSI, MISO> SpiLink for BitBangSpi<CS, SCK, MOSI, MISO>
where
    CS: OutputPin,
    SCK: OutputPin,
    MOSI: OutputPin,
    MISO: InputPin,
{
    type Error = digital::ErrorKind;

    fn exchange(&mut self, command: u8, write: &[u8], read: &mut [u8]) -> Result<(), Self::Error> {
        self.cs.set_low().map_err(|err| err.kind())?;

        let result = self.frame(command, write, read);

        // 无论移位是否成功都要释放片选
        let deselect = self.cs.set_high().map_err(|err| err.kind());

        result.and(deselect)
    }
}
