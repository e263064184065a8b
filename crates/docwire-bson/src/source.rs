//! 字节源模块
//!
//! [`ByteSource`] 统一了"读取 N 字节"、"读取到分隔符"和"位置追踪"：
//!
//! - [`SliceSource`]：基于固定字节切片，零拷贝
//! - [`StreamSource`]：基于任意 `Read`，内部缓冲区按需增长，从不缩小
//!
//! 两者都支持读取上限（ceiling）：一个绝对位置，越过它的读取返回
//! [`SourceError::CeilingReached`]，与数据耗尽（[`SourceError::EndOfInput`]）区分开。

use docwire_common::StreamConfig;
use std::io::{ErrorKind, Read};
use thiserror::Error;
use tracing::trace;

/// 字节源错误
#[derive(Error, Debug)]
pub enum SourceError {
    /// 数据在读满请求之前结束
    #[error("End of input: requested {requested} bytes, {available} available")]
    EndOfInput { requested: usize, available: usize },

    /// 数据结束时仍未找到分隔符
    #[error("Delimiter 0x{delimiter:02X} not found before end of input")]
    DelimiterNotFound { delimiter: u8 },

    /// 读取会越过当前上限
    #[error("Read limit reached at position {ceiling}")]
    CeilingReached { ceiling: usize },

    /// 底层读取失败
    #[error("Stream read error: {0}")]
    Io(#[from] std::io::Error),

    /// 缓冲区扩容失败
    #[error("Cannot allocate {0} bytes")]
    AllocationFailed(usize),
}

/// 同步、单线程的字节源
///
/// 返回的切片只在下一次调用前有效。位置从 0 开始计数，上限使用同一坐标。
pub trait ByteSource {
    /// 读取恰好 `n` 个字节
    fn read_exact(&mut self, n: usize) -> Result<&[u8], SourceError>;

    /// 读取直到 `delimiter`，返回分隔符之前的字节；分隔符被消耗但不返回
    fn read_until(&mut self, delimiter: u8) -> Result<&[u8], SourceError>;

    /// 已消耗的字节数
    fn position(&self) -> usize;

    fn ceiling(&self) -> Option<usize>;

    /// 设置绝对读取上限，`None` 表示不限
    fn set_ceiling(&mut self, ceiling: Option<usize>);

    /// 读取恰好 `n` 个字节并复制出来
    fn read_exact_owned(&mut self, n: usize) -> Result<Vec<u8>, SourceError> {
        Ok(self.read_exact(n)?.to_vec())
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], SourceError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_exact(N)?);
        Ok(out)
    }

    fn read_u8(&mut self) -> Result<u8, SourceError> {
        Ok(self.read_array::<1>()?[0])
    }

    fn read_i32_le(&mut self) -> Result<i32, SourceError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    fn read_u32_le(&mut self) -> Result<u32, SourceError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    fn read_i64_le(&mut self) -> Result<i64, SourceError> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    fn read_f64_le(&mut self) -> Result<f64, SourceError> {
        Ok(f64::from_le_bytes(self.read_array()?))
    }
}

/// 检查从 `position` 起读取 `n` 字节是否越过上限
fn check_ceiling(position: usize, n: usize, ceiling: Option<usize>) -> Result<(), SourceError> {
    match ceiling {
        Some(c) if position.saturating_add(n) > c => Err(SourceError::CeilingReached { ceiling: c }),
        _ => Ok(()),
    }
}

/// 基于内存切片的字节源
#[derive(Debug, Clone)]
pub struct SliceSource<'a> {
    data: &'a [u8],
    pos: usize,
    ceiling: Option<usize>,
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            ceiling: None,
        }
    }

    /// 尚未消耗的字节
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// 与 `read_exact` 相同，但返回的切片借用原始数据
    pub fn read_slice(&mut self, n: usize) -> Result<&'a [u8], SourceError> {
        check_ceiling(self.pos, n, self.ceiling)?;
        let available = self.data.len() - self.pos;
        if n > available {
            return Err(SourceError::EndOfInput {
                requested: n,
                available,
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// 与 `read_until` 相同，但返回的切片借用原始数据
    pub fn read_slice_until(&mut self, delimiter: u8) -> Result<&'a [u8], SourceError> {
        let limit = match self.ceiling {
            Some(c) => c.min(self.data.len()),
            None => self.data.len(),
        };
        let window = &self.data[self.pos..limit.max(self.pos)];
        match window.iter().position(|&b| b == delimiter) {
            Some(idx) => {
                let slice = &window[..idx];
                self.pos += idx + 1;
                Ok(slice)
            }
            None => match self.ceiling {
                Some(c) if c < self.data.len() => Err(SourceError::CeilingReached { ceiling: c }),
                _ => Err(SourceError::DelimiterNotFound { delimiter }),
            },
        }
    }
}

impl<'a> ByteSource for SliceSource<'a> {
    fn read_exact(&mut self, n: usize) -> Result<&[u8], SourceError> {
        self.read_slice(n)
    }

    fn read_until(&mut self, delimiter: u8) -> Result<&[u8], SourceError> {
        self.read_slice_until(delimiter)
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn ceiling(&self) -> Option<usize> {
        self.ceiling
    }

    fn set_ceiling(&mut self, ceiling: Option<usize>) {
        self.ceiling = ceiling;
    }
}

/// 基于 `Read` 的增量字节源
///
/// 缓冲区初始为 `buffer_size`，单次读取超出剩余容量时先把未消耗的数据移到开头，
/// 仍不够再按 `old + min(old, buffer_increment)` 反复增长，从不缩小。
///
/// 设置了上限时，从底层读取的总字节数不会超过上限。解码器总是为每一帧设置上限，
/// 因此一次解码只从底层取走属于该文档的字节，同一个 reader 可以连续解码多个文档。
#[derive(Debug)]
pub struct StreamSource<R> {
    reader: R,
    buf: Vec<u8>,
    /// 第一个未消耗字节
    start: usize,
    /// 有效数据末尾
    end: usize,
    increment: usize,
    /// 已消耗的字节数
    position: usize,
    ceiling: Option<usize>,
}

impl<R: Read> StreamSource<R> {
    /// 使用默认缓冲区配置创建
    pub fn new(reader: R) -> Self {
        Self::with_config(reader, &StreamConfig::default())
    }

    pub fn with_config(reader: R, config: &StreamConfig) -> Self {
        Self::with_buffer(reader, config.buffer_size, config.buffer_increment)
    }

    /// # Brief
    /// 指定初始缓冲区大小和增长步长创建
    ///
    /// # Arguments
    /// * `reader` - 底层数据来源
    /// * `buffer_size` - 初始缓冲区大小
    /// * `increment` - 单次增长的上限
    pub fn with_buffer(reader: R, buffer_size: usize, increment: usize) -> Self {
        Self {
            reader,
            buf: vec![0u8; buffer_size],
            start: 0,
            end: 0,
            increment,
            position: 0,
            ceiling: None,
        }
    }

    /// 当前缓冲区大小
    pub fn buffer_capacity(&self) -> usize {
        self.buf.len()
    }

    /// 已从底层读出但尚未消耗的字节数
    pub fn buffered(&self) -> usize {
        self.end - self.start
    }

    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    /// 取回底层 reader，缓冲区中未消耗的数据会被丢弃
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// 底层已读出的总字节数
    fn pulled(&self) -> usize {
        self.position + self.buffered()
    }

    /// 保证缓冲区从 `start` 起至少能容纳 `n` 字节
    fn make_room(&mut self, n: usize) -> Result<(), SourceError> {
        if self.buf.len() - self.start >= n {
            return Ok(());
        }
        if self.start > 0 {
            self.buf.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.start = 0;
        }
        if self.buf.len() >= n {
            return Ok(());
        }

        let old = self.buf.len();
        let mut new_size = old;
        while new_size < n {
            new_size += new_size.min(self.increment).max(1);
        }
        self.buf
            .try_reserve_exact(new_size - old)
            .map_err(|_| SourceError::AllocationFailed(new_size))?;
        self.buf.resize(new_size, 0);
        trace!("stream buffer grown from {} to {} bytes", old, new_size);
        Ok(())
    }

    /// 从底层读取一次，遵守缓冲区剩余空间和上限
    ///
    /// # Returns
    /// 读到的字节数，0 表示数据结束
    fn pull(&mut self) -> Result<usize, SourceError> {
        let mut limit = self.buf.len() - self.end;
        if let Some(c) = self.ceiling {
            limit = limit.min(c.saturating_sub(self.pulled()));
        }
        if limit == 0 {
            return Ok(0);
        }
        loop {
            match self.reader.read(&mut self.buf[self.end..self.end + limit]) {
                Ok(read) => {
                    self.end += read;
                    return Ok(read);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(SourceError::Io(e)),
            }
        }
    }

    /// 上限之内可直接使用的缓冲字节数
    fn visible(&self) -> usize {
        match self.ceiling {
            Some(c) => self.buffered().min(c.saturating_sub(self.position)),
            None => self.buffered(),
        }
    }

    fn consume(&mut self, n: usize) -> &[u8] {
        let from = self.start;
        self.start += n;
        self.position += n;
        &self.buf[from..from + n]
    }
}

impl<R: Read> ByteSource for StreamSource<R> {
    fn read_exact(&mut self, n: usize) -> Result<&[u8], SourceError> {
        check_ceiling(self.position, n, self.ceiling)?;
        if self.buffered() < n {
            self.make_room(n)?;
            while self.buffered() < n {
                if self.pull()? == 0 {
                    return Err(SourceError::EndOfInput {
                        requested: n,
                        available: self.buffered(),
                    });
                }
            }
        }
        Ok(self.consume(n))
    }

    fn read_until(&mut self, delimiter: u8) -> Result<&[u8], SourceError> {
        let mut scanned = 0;
        loop {
            let visible = self.visible();
            if let Some(idx) = self.buf[self.start + scanned..self.start + visible]
                .iter()
                .position(|&b| b == delimiter)
            {
                let len = scanned + idx;
                let bytes = self.consume(len + 1);
                return Ok(&bytes[..len]);
            }
            scanned = visible;

            if let Some(c) = self.ceiling {
                if self.position + scanned >= c {
                    return Err(SourceError::CeilingReached { ceiling: c });
                }
            }
            self.make_room(self.buffered() + 1)?;
            if self.pull()? == 0 {
                return Err(SourceError::DelimiterNotFound { delimiter });
            }
        }
    }

    fn position(&self) -> usize {
        self.position
    }

    fn ceiling(&self) -> Option<usize> {
        self.ceiling
    }

    fn set_ceiling(&mut self, ceiling: Option<usize>) {
        self.ceiling = ceiling;
    }
}
