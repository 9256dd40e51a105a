use log::debug;

use super::error::Error;
use super::link::SpiLink;

/// 读命令：地址最高位置 1
const READ_FLAG: u8 = 0x80;

/// 突发读取长度
///
/// 一条读命令之后寄存器地址自动递增，片选保持有效期间持续读出。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurstLength {
    /// 3字节: 1个值
    Three = 3,
    /// 6字节: 2个值（3+3）
    Six = 6,
    /// 8字节: 3个值（3+3+2）
    Eight = 8,
    /// 9字节: 3个值（3+3+3）
    Nine = 9,
}

impl BurstLength {
    /// 每个值占用的字节数
    fn groups(self) -> &'static [usize] {
        match self {
            BurstLength::Three => &[3],
            BurstLength::Six => &[3, 3],
            BurstLength::Eight => &[3, 3, 2],
            BurstLength::Nine => &[3, 3, 3],
        }
    }
}

/// 一次突发读取组装出的 1~3 个无符号值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurstWords {
    values: [u32; 3],
    count: usize,
}

impl BurstWords {
    /// 第 `index` 个值，超出本次读取的个数时为 `None`
    pub fn get(&self, index: usize) -> Option<u32> {
        (index < self.count).then(|| self.values[index])
    }

    pub fn first(&self) -> u32 {
        self.values[0]
    }

    pub fn second(&self) -> Option<u32> {
        self.get(1)
    }

    pub fn third(&self) -> Option<u32> {
        self.get(2)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// 高字节在前的左移累加
fn accumulate(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, byte| (acc << 8) | *byte as u32)
}

/// 寄存器级传输层
///
/// 每个方法对应链路上的一帧，也就是一次总线独占。
/// 多字节读取在线上都是大端序，小端访问器只是把大端结果交换字节。
pub struct Transport<L> {
    link: L,
}

impl<L: SpiLink> Transport<L> {
    pub fn new(link: L) -> Self {
        Self { link }
    }

    pub fn release(self) -> L {
        self.link
    }

    fn exchange(&mut self, command: u8, write: &[u8], read: &mut [u8]) -> Result<(), Error<L::Error>> {
        self.link.exchange(command, write, read).map_err(Error::Bus)
    }

    /// 写一个寄存器（命令字节最高位清 0）
    pub fn write_register(&mut self, addr: u8, value: u8) -> Result<(), Error<L::Error>> {
        self.exchange(addr & !READ_FLAG, &[value], &mut [])?;
        debug!("写寄存器(r{:02x}): {:02x}", addr, value);
        Ok(())
    }

    /// 读一个寄存器（命令字节最高位置 1）
    pub fn read_register(&mut self, addr: u8) -> Result<u8, Error<L::Error>> {
        let mut data = [0u8; 1];
        self.exchange(addr | READ_FLAG, &[], &mut data)?;
        debug!("读寄存器(r{:02x}): {:02x}", addr, data[0]);
        Ok(data[0])
    }

    /// 读两个连续寄存器，大端序组装
    pub fn read_u16(&mut self, addr: u8) -> Result<u16, Error<L::Error>> {
        let mut data = [0u8; 2];
        self.exchange(addr | READ_FLAG, &[], &mut data)?;
        debug!("读寄存器(r{:02x}): {:02x}/{:02x}", addr, data[0], data[1]);
        Ok(accumulate(&data) as u16)
    }

    /// 小端序访问器：大端读取结果交换高低字节
    pub fn read_u16_le(&mut self, addr: u8) -> Result<u16, Error<L::Error>> {
        Ok(self.read_u16(addr)?.swap_bytes())
    }

    pub fn read_i16_le(&mut self, addr: u8) -> Result<i16, Error<L::Error>> {
        Ok(self.read_u16_le(addr)? as i16)
    }

    /// 读三个连续寄存器，大端序组装
    pub fn read_u24(&mut self, addr: u8) -> Result<u32, Error<L::Error>> {
        let mut data = [0u8; 3];
        self.exchange(addr | READ_FLAG, &[], &mut data)?;
        debug!("读寄存器(r{:02x}): {:02x}/{:02x}/{:02x}", addr, data[0], data[1], data[2]);
        Ok(accumulate(&data))
    }

    /// 突发读取
    ///
    /// 只发送一次读命令，按 [`BurstLength`] 的分组依次组装各个值。
    pub fn read_burst(&mut self, addr: u8, length: BurstLength) -> Result<BurstWords, Error<L::Error>> {
        let mut data = [0u8; 9];
        let data = &mut data[..length as usize];
        self.exchange(addr | READ_FLAG, &[], data)?;
        debug!("突发读取(r{:02x}, {}字节): {:02x?}", addr, data.len(), data);

        let mut words = BurstWords {
            values: [0; 3],
            count: 0,
        };
        let mut offset = 0;
        for size in length.groups() {
            words.values[words.count] = accumulate(&data[offset..offset + size]);
            words.count += 1;
            offset += size;
        }

        Ok(words)
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;

    /// 不管命令是什么都按顺序返回固定字节流的链路
    struct Scripted {
        stream: Vec<u8>,
        frames: Vec<(u8, Vec<u8>, usize)>,
    }

    impl Scripted {
        fn new(stream: &[u8]) -> Self {
            Self {
                stream: stream.to_vec(),
                frames: Vec::new(),
            }
        }
    }

    impl SpiLink for Scripted {
        type Error = Infallible;

        fn exchange(&mut self, command: u8, write: &[u8], read: &mut [u8]) -> Result<(), Self::Error> {
            for (slot, byte) in read.iter_mut().zip(self.stream.iter()) {
                *slot = *byte;
            }
            self.frames.push((command, write.to_vec(), read.len()));
            Ok(())
        }
    }

    #[test]
    fn write_clears_the_read_flag() {
        let mut transport = Transport::new(Scripted::new(&[]));
        transport.write_register(0xF4, 0x57).unwrap();

        let link = transport.release();
        assert_eq!(link.frames, vec![(0x74, vec![0x57], 0)]);
    }

    #[test]
    fn read_sets_the_read_flag() {
        let mut transport = Transport::new(Scripted::new(&[0x60]));
        assert_eq!(transport.read_register(0x50).unwrap(), 0x60);
        assert_eq!(transport.read_register(0xD0).unwrap(), 0x60);

        let link = transport.release();
        assert_eq!(link.frames[0].0, 0xD0);
        assert_eq!(link.frames[1].0, 0xD0);
    }

    #[test]
    fn sixteen_bit_reads_are_big_endian_on_the_wire() {
        let mut transport = Transport::new(Scripted::new(&[0x12, 0x34]));
        assert_eq!(transport.read_u16(0x88).unwrap(), 0x1234);
        assert_eq!(transport.read_u16_le(0x88).unwrap(), 0x3412);
    }

    #[test]
    fn signed_little_endian_read() {
        // -1000 = 0xFC18，寄存器中低字节在前
        let mut transport = Transport::new(Scripted::new(&[0x18, 0xFC]));
        assert_eq!(transport.read_i16_le(0x8C).unwrap(), -1000);
    }

    #[test]
    fn twenty_four_bit_read() {
        let mut transport = Transport::new(Scripted::new(&[0x7E, 0xED, 0x00]));
        assert_eq!(transport.read_u24(0xFA).unwrap(), 0x7EED00);
    }

    #[test]
    fn burst_of_six_yields_two_words() {
        let mut transport = Transport::new(Scripted::new(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06]));
        let words = transport.read_burst(0xF7, BurstLength::Six).unwrap();

        assert_eq!(words.len(), 2);
        assert_eq!(words.first(), 0x010203);
        assert_eq!(words.second(), Some(0x040506));
        assert_eq!(words.third(), None);
    }

    #[test]
    fn burst_of_three_yields_only_the_first_word() {
        let mut transport = Transport::new(Scripted::new(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06]));
        let words = transport.read_burst(0xF7, BurstLength::Three).unwrap();

        assert_eq!(words.len(), 1);
        assert_eq!(words.first(), 0x010203);
        assert_eq!(words.second(), None);

        let link = transport.release();
        assert_eq!(link.frames, vec![(0xF7, vec![], 3)]);
    }

    #[test]
    fn burst_third_word_width_follows_length() {
        let stream = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09];

        let mut transport = Transport::new(Scripted::new(&stream));
        let words = transport.read_burst(0xF7, BurstLength::Eight).unwrap();
        assert_eq!(words.third(), Some(0x0708));

        let mut transport = Transport::new(Scripted::new(&stream));
        let words = transport.read_burst(0xF7, BurstLength::Nine).unwrap();
        assert_eq!(words.third(), Some(0x070809));

        // 整个突发只占一帧
        assert_eq!(transport.release().frames.len(), 1);
    }
}
