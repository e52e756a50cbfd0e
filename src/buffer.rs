// src/buffer.rs
use crate::errors::StashError;
use crate::random;

use age::secrecy::zeroize::{Zeroize, Zeroizing};
use std::cell::{Ref, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::io::{self, Write};
use std::ops::{AddAssign, MulAssign, SubAssign};
use std::rc::{Rc, Weak};

/// Erasure and display behaviour of a [`SecureBuffer`].
#[derive(Debug, Clone, Copy)]
pub struct BufferConfig {
    /// Overwrite every byte with zero when the buffer is destroyed
    pub erase_on_destroy: bool,
    /// Overwrite every byte with OS randomness before zeroing
    pub randomize_on_destroy: bool,
    /// Erase the buffer once a streaming pass has consumed it
    pub erase_on_stream: bool,
    /// Masking character treated as a no-op by cursor writes
    pub placeholder: u8,
    /// Register split fragments for bulk erasure
    pub track_fragments: bool,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            erase_on_destroy: true,
            randomize_on_destroy: false,
            erase_on_stream: true,
            placeholder: b'?',
            track_fragments: false,
        }
    }
}

/// Source material for a buffer operation, one variant per supported kind.
///
/// Conversion to bytes consumes the source: text and byte vectors are
/// zeroized once copied in, buffers are emptied. Numbers up to 255 become a
/// single byte; larger numbers decompose into the ASCII bytes of their
/// decimal digits.
pub enum BufferInput {
    Bytes(Vec<u8>),
    Text(String),
    Byte(u8),
    Number(u64),
    Buffer(SecureBuffer),
}

impl BufferInput {
    pub fn into_bytes(self) -> Zeroizing<Vec<u8>> {
        match self {
            Self::Bytes(v) => Zeroizing::new(v),
            Self::Text(s) => Zeroizing::new(s.into_bytes()),
            Self::Byte(b) => Zeroizing::new(vec![b]),
            Self::Number(n) => {
                if n <= 255 {
                    Zeroizing::new(vec![n as u8])
                } else {
                    Zeroizing::new(n.to_string().into_bytes())
                }
            }
            Self::Buffer(mut b) => b.take_bytes(),
        }
    }
}

impl From<Vec<u8>> for BufferInput {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<&[u8]> for BufferInput {
    fn from(v: &[u8]) -> Self {
        Self::Bytes(v.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for BufferInput {
    fn from(v: &[u8; N]) -> Self {
        Self::Bytes(v.to_vec())
    }
}

impl From<String> for BufferInput {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for BufferInput {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<char> for BufferInput {
    fn from(c: char) -> Self {
        Self::Text(c.to_string())
    }
}

impl From<u8> for BufferInput {
    fn from(b: u8) -> Self {
        Self::Byte(b)
    }
}

impl From<u64> for BufferInput {
    fn from(n: u64) -> Self {
        Self::Number(n)
    }
}

impl From<SecureBuffer> for BufferInput {
    fn from(b: SecureBuffer) -> Self {
        Self::Buffer(b)
    }
}

struct Core {
    data: Vec<u8>,
    cursor: usize,
    config: BufferConfig,
    fragments: Vec<Weak<RefCell<Core>>>,
}

impl Core {
    /// Zero, truncate to length zero, and reset the cursor. Unconditional.
    fn clearmem(&mut self) {
        self.data.zeroize();
        self.data.clear();
        self.cursor = 0;
    }

    /// Config-driven erasure: randomize first when configured, then zero.
    fn erase(&mut self) {
        if self.config.randomize_on_destroy && !self.data.is_empty() {
            random::fill_bytes(&mut self.data).ok();
        }
        if self.config.erase_on_destroy {
            self.data.zeroize();
        }
        self.data.clear();
        self.cursor = 0;
    }
}

impl Drop for Core {
    fn drop(&mut self) {
        // Scope exit erases the buffer and every live tracked fragment,
        // on all exit paths including unwinding.
        let fragments: Vec<Weak<RefCell<Core>>> = self.fragments.drain(..).collect();
        for frag in fragments {
            if let Some(core) = frag.upgrade() {
                core.borrow_mut().erase();
            }
        }
        self.erase();
    }
}

/// Mutable byte sequence with guaranteed, idempotent erasure of its backing
/// storage.
///
/// A `SecureBuffer` is a shared handle: cloning produces another view of the
/// same storage, and destroying through any handle empties every view. Split
/// operations can register their fragments with the parent so one bulk-erase
/// call wipes all of them, whether or not the caller kept the handles.
/// Buffers are intentionally single-threaded (`!Send`); a store owns its
/// buffers on one logical thread.
#[derive(Clone)]
pub struct SecureBuffer {
    core: Rc<RefCell<Core>>,
}

impl SecureBuffer {
    pub fn new() -> Self {
        Self::with_config(BufferConfig::default())
    }

    pub fn with_config(config: BufferConfig) -> Self {
        Self {
            core: Rc::new(RefCell::new(Core {
                data: Vec::new(),
                cursor: 0,
                config,
                fragments: Vec::new(),
            })),
        }
    }

    /// Build a buffer from any supported input kind. The input is consumed:
    /// no second live copy of its bytes survives the call.
    pub fn from_input<T: Into<BufferInput>>(input: T, config: BufferConfig) -> Self {
        let mut bytes = input.into().into_bytes();
        let data = std::mem::take(&mut *bytes);
        let cursor = data.len();
        Self {
            core: Rc::new(RefCell::new(Core {
                data,
                cursor,
                config,
                fragments: Vec::new(),
            })),
        }
    }

    fn fragment(bytes: &[u8], config: BufferConfig) -> Self {
        Self::from_input(bytes.to_vec(), config)
    }

    pub fn len(&self) -> usize {
        self.core.borrow().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.borrow().data.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.core.borrow().cursor
    }

    pub fn config(&self) -> BufferConfig {
        self.core.borrow().config
    }

    /// Borrow the backing bytes without copying them.
    pub fn bytes(&self) -> Ref<'_, [u8]> {
        Ref::map(self.core.borrow(), |core| core.data.as_slice())
    }

    /// Escape hatch for display and tests: renders each byte as a char.
    /// The returned `String` is an unprotected copy.
    pub fn to_plaintext(&self) -> String {
        self.core.borrow().data.iter().map(|&b| b as char).collect()
    }

    /// Move the backing bytes out, leaving the buffer empty. Ownership
    /// transfer: exactly one live copy exists afterward, and it zeroes
    /// itself on drop.
    pub fn take_bytes(&mut self) -> Zeroizing<Vec<u8>> {
        let mut core = self.core.borrow_mut();
        core.cursor = 0;
        Zeroizing::new(std::mem::take(&mut core.data))
    }

    pub fn append<T: Into<BufferInput>>(&mut self, item: T) -> &mut Self {
        let bytes = item.into().into_bytes();
        self.core.borrow_mut().data.extend_from_slice(&bytes);
        self
    }

    /// Insert the item's bytes one at a time starting at `index`, shifting
    /// subsequent contents. Indexes past the end append.
    pub fn insert<T: Into<BufferInput>>(&mut self, index: usize, item: T) -> &mut Self {
        let bytes = item.into().into_bytes();
        let mut core = self.core.borrow_mut();
        let at = index.min(core.data.len());
        for (i, &b) in bytes.iter().enumerate() {
            core.data.insert(at + i, b);
        }
        drop(core);
        self
    }

    pub fn extend<I, T>(&mut self, items: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: Into<BufferInput>,
    {
        for item in items {
            self.append(item);
        }
        self
    }

    /// In-place prefix concatenation: `other`'s bytes land at position 0 and
    /// `other` is left empty.
    pub fn prepend(&mut self, mut other: SecureBuffer) -> &mut Self {
        let mut bytes = other.take_bytes();
        let mut core = self.core.borrow_mut();
        core.data.splice(0..0, bytes.drain(..));
        drop(core);
        self
    }

    pub fn contains<T: Into<BufferInput>>(&self, item: T) -> bool {
        self.find(item).is_some()
    }

    /// Count non-overlapping occurrences.
    pub fn count<T: Into<BufferInput>>(&self, item: T) -> usize {
        let needle = item.into().into_bytes();
        if needle.is_empty() {
            return 0;
        }
        let core = self.core.borrow();
        let mut n = 0;
        let mut pos = 0;
        while let Some(i) = find_in(&core.data[pos..], &needle) {
            n += 1;
            pos += i + needle.len();
        }
        n
    }

    pub fn find<T: Into<BufferInput>>(&self, item: T) -> Option<usize> {
        let needle = item.into().into_bytes();
        find_in(&self.core.borrow().data, &needle)
    }

    pub fn rfind<T: Into<BufferInput>>(&self, item: T) -> Option<usize> {
        let needle = item.into().into_bytes();
        rfind_in(&self.core.borrow().data, &needle)
    }

    pub fn index<T: Into<BufferInput>>(&self, item: T) -> Result<usize, StashError> {
        self.find(item)
            .ok_or_else(|| StashError::Parse("subsequence not found".to_string()))
    }

    pub fn rindex<T: Into<BufferInput>>(&self, item: T) -> Result<usize, StashError> {
        self.rfind(item)
            .ok_or_else(|| StashError::Parse("subsequence not found".to_string()))
    }

    pub fn starts_with<T: Into<BufferInput>>(&self, item: T) -> bool {
        let needle = item.into().into_bytes();
        self.core.borrow().data.starts_with(&needle)
    }

    pub fn ends_with<T: Into<BufferInput>>(&self, item: T) -> bool {
        let needle = item.into().into_bytes();
        self.core.borrow().data.ends_with(&needle)
    }

    /// Split on `sep`, producing a new buffer per fragment. With fragment
    /// tracking enabled every fragment is registered with this buffer, so
    /// [`erase_all`](Self::erase_all) wipes them even if the caller kept the
    /// handles. At most `maxsplit` cuts when given.
    pub fn split<T: Into<BufferInput>>(
        &mut self,
        sep: T,
        maxsplit: Option<usize>,
    ) -> Vec<SecureBuffer> {
        let needle = sep.into().into_bytes();
        let mut frags = Vec::new();
        {
            let core = self.core.borrow();
            let data = &core.data;
            if needle.is_empty() {
                frags.push(Self::fragment(data, core.config));
            } else {
                let limit = maxsplit.unwrap_or(usize::MAX);
                let mut start = 0;
                let mut cuts = 0;
                while cuts < limit {
                    match find_in(&data[start..], &needle) {
                        Some(i) => {
                            frags.push(Self::fragment(&data[start..start + i], core.config));
                            start += i + needle.len();
                            cuts += 1;
                        }
                        None => break,
                    }
                }
                frags.push(Self::fragment(&data[start..], core.config));
            }
        }
        self.adopt(&frags);
        frags
    }

    /// Like [`split`](Self::split) but cuts are counted from the right.
    pub fn rsplit<T: Into<BufferInput>>(
        &mut self,
        sep: T,
        maxsplit: Option<usize>,
    ) -> Vec<SecureBuffer> {
        let needle = sep.into().into_bytes();
        let mut frags = Vec::new();
        {
            let core = self.core.borrow();
            let data = &core.data;
            if needle.is_empty() {
                frags.push(Self::fragment(data, core.config));
            } else {
                let limit = maxsplit.unwrap_or(usize::MAX);
                let mut cuts: Vec<usize> = Vec::new();
                let mut end = data.len();
                while cuts.len() < limit {
                    match rfind_in(&data[..end], &needle) {
                        Some(i) => {
                            cuts.push(i);
                            end = i;
                        }
                        None => break,
                    }
                }
                cuts.reverse();
                let mut start = 0;
                for &cut in &cuts {
                    frags.push(Self::fragment(&data[start..cut], core.config));
                    start = cut + needle.len();
                }
                frags.push(Self::fragment(&data[start..], core.config));
            }
        }
        self.adopt(&frags);
        frags
    }

    /// Split around the first occurrence of `sep` into (head, sep, tail).
    /// When `sep` is absent the whole content lands in the head.
    pub fn partition<T: Into<BufferInput>>(
        &mut self,
        sep: T,
    ) -> (SecureBuffer, SecureBuffer, SecureBuffer) {
        let needle = sep.into().into_bytes();
        let parts = {
            let core = self.core.borrow();
            let data = &core.data;
            let hit = if needle.is_empty() {
                None
            } else {
                find_in(data, &needle)
            };
            match hit {
                Some(i) => (
                    Self::fragment(&data[..i], core.config),
                    Self::fragment(&needle, core.config),
                    Self::fragment(&data[i + needle.len()..], core.config),
                ),
                None => (
                    Self::fragment(data, core.config),
                    Self::fragment(&[], core.config),
                    Self::fragment(&[], core.config),
                ),
            }
        };
        self.adopt(&[parts.0.clone(), parts.1.clone(), parts.2.clone()]);
        parts
    }

    /// Split around the last occurrence of `sep` into (head, sep, tail).
    /// When `sep` is absent the whole content lands in the tail.
    pub fn rpartition<T: Into<BufferInput>>(
        &mut self,
        sep: T,
    ) -> (SecureBuffer, SecureBuffer, SecureBuffer) {
        let needle = sep.into().into_bytes();
        let parts = {
            let core = self.core.borrow();
            let data = &core.data;
            let hit = if needle.is_empty() {
                None
            } else {
                rfind_in(data, &needle)
            };
            match hit {
                Some(i) => (
                    Self::fragment(&data[..i], core.config),
                    Self::fragment(&needle, core.config),
                    Self::fragment(&data[i + needle.len()..], core.config),
                ),
                None => (
                    Self::fragment(&[], core.config),
                    Self::fragment(&[], core.config),
                    Self::fragment(data, core.config),
                ),
            }
        };
        self.adopt(&[parts.0.clone(), parts.1.clone(), parts.2.clone()]);
        parts
    }

    fn adopt(&mut self, frags: &[SecureBuffer]) {
        let mut core = self.core.borrow_mut();
        if !core.config.track_fragments {
            return;
        }
        for frag in frags {
            core.fragments.push(Rc::downgrade(&frag.core));
        }
    }

    pub fn strip(&mut self, chars: Option<&str>) -> &mut Self {
        self.strip_impl(chars.unwrap_or(" \t\n"), true, true)
    }

    pub fn lstrip(&mut self, chars: Option<&str>) -> &mut Self {
        self.strip_impl(chars.unwrap_or(" \t\n"), true, false)
    }

    pub fn rstrip(&mut self, chars: Option<&str>) -> &mut Self {
        self.strip_impl(chars.unwrap_or(" \t\n"), false, true)
    }

    // Stripped bytes are zeroed in place before removal.
    fn strip_impl(&mut self, chars: &str, left: bool, right: bool) -> &mut Self {
        let set: Vec<u8> = chars.bytes().collect();
        let mut core = self.core.borrow_mut();
        if right {
            while let Some(&last) = core.data.last() {
                if !set.contains(&last) {
                    break;
                }
                let end = core.data.len() - 1;
                core.data[end] = 0;
                core.data.truncate(end);
            }
        }
        if left {
            let mut lbound = 0;
            while lbound < core.data.len() && set.contains(&core.data[lbound]) {
                core.data[lbound] = 0;
                lbound += 1;
            }
            core.data.drain(..lbound);
        }
        core.cursor = core.cursor.min(core.data.len());
        drop(core);
        self
    }

    pub fn ljust(&mut self, width: usize, fill: u8) -> &mut Self {
        let mut core = self.core.borrow_mut();
        while core.data.len() < width {
            core.data.push(fill);
        }
        drop(core);
        self
    }

    pub fn rjust(&mut self, width: usize, fill: u8) -> &mut Self {
        let mut core = self.core.borrow_mut();
        while core.data.len() < width {
            core.data.insert(0, fill);
        }
        drop(core);
        self
    }

    pub fn center(&mut self, width: usize, fill: u8) -> &mut Self {
        let mut core = self.core.borrow_mut();
        let mut front = true;
        while core.data.len() < width {
            if front {
                core.data.insert(0, fill);
            } else {
                core.data.push(fill);
            }
            front = !front;
        }
        drop(core);
        self
    }

    pub fn lower(&mut self) -> &mut Self {
        self.core.borrow_mut().data.make_ascii_lowercase();
        self
    }

    pub fn upper(&mut self) -> &mut Self {
        self.core.borrow_mut().data.make_ascii_uppercase();
        self
    }

    pub fn swapcase(&mut self) -> &mut Self {
        for b in self.core.borrow_mut().data.iter_mut() {
            if b.is_ascii_uppercase() {
                *b = b.to_ascii_lowercase();
            } else if b.is_ascii_lowercase() {
                *b = b.to_ascii_uppercase();
            }
        }
        self
    }

    pub fn capitalize(&mut self) -> &mut Self {
        if let Some(b) = self.core.borrow_mut().data.first_mut() {
            *b = b.to_ascii_uppercase();
        }
        self
    }

    pub fn title(&mut self) -> &mut Self {
        self.capitalize();
        let mut core = self.core.borrow_mut();
        for i in 1..core.data.len() {
            if core.data[i - 1] == b' ' {
                core.data[i] = core.data[i].to_ascii_uppercase();
            }
        }
        drop(core);
        self
    }

    pub fn zfill(&mut self, width: usize) -> &mut Self {
        let mut core = self.core.borrow_mut();
        let offset = match core.data.first() {
            Some(&b'-') | Some(&b'+') => 1,
            _ => 0,
        };
        while core.data.len() < width {
            core.data.insert(offset, b'0');
        }
        drop(core);
        self
    }

    pub fn expand_tabs(&mut self, tabsize: usize) -> &mut Self {
        let fill = " ".repeat(tabsize);
        self.replace("\t", fill, None)
    }

    /// In-place replace: each occurrence of `old` is zeroed, deleted, and
    /// `new` inserted at the same position. The scan resumes past the
    /// inserted text, so differing lengths cannot corrupt later positions.
    pub fn replace<O, N>(&mut self, old: O, new: N, limit: Option<usize>) -> &mut Self
    where
        O: Into<BufferInput>,
        N: Into<BufferInput>,
    {
        let old_b = old.into().into_bytes();
        let new_b = new.into().into_bytes();
        if old_b.is_empty() {
            return self;
        }
        let limit = limit.unwrap_or(usize::MAX);
        let mut replaced = 0;
        let mut pos = 0;
        while replaced < limit {
            let found = find_in(&self.core.borrow().data[pos..], &old_b);
            let Some(i) = found else { break };
            let at = pos + i;
            let mut core = self.core.borrow_mut();
            for b in core.data[at..at + old_b.len()].iter_mut() {
                *b = 0;
            }
            core.data.drain(at..at + old_b.len());
            for (j, &b) in new_b.iter().enumerate() {
                core.data.insert(at + j, b);
            }
            core.cursor = core.cursor.min(core.data.len());
            drop(core);
            pos = at + new_b.len();
            replaced += 1;
        }
        self
    }

    /// Replace successive `{}` markers with the given inputs, one each.
    pub fn format<I, T>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: Into<BufferInput>,
    {
        for arg in args {
            self.replace("{}", arg, Some(1));
        }
        self
    }

    /// Treat `self` as the separator and mutate it into the joined result:
    /// `first + (sep + item)*`. The internal separator snapshot and every
    /// consumed item are destroyed, so supply a disposable separator buffer.
    pub fn join(&mut self, items: Vec<SecureBuffer>) -> &mut Self {
        let sep = Zeroizing::new(self.core.borrow().data.clone());
        self.clearmem();
        let mut first = true;
        for mut item in items {
            let mut bytes = item.take_bytes();
            let mut core = self.core.borrow_mut();
            if !first {
                core.data.extend_from_slice(&sep);
            }
            core.data.append(&mut bytes);
            first = false;
        }
        self
    }

    /// Clamp the cursor into `[0, len]`.
    pub fn seek(&mut self, position: usize) {
        let mut core = self.core.borrow_mut();
        core.cursor = position.min(core.data.len());
    }

    /// Insert each character at the cursor, advancing it. The configured
    /// placeholder character is a masking marker and inserts nothing.
    /// Non-ASCII text is rejected before any byte is written.
    pub fn write(&mut self, text: &str) -> Result<(), StashError> {
        if !text.is_ascii() {
            return Err(StashError::InputType(
                "cursor writes accept ASCII text only".to_string(),
            ));
        }
        let mut core = self.core.borrow_mut();
        for &b in text.as_bytes() {
            if b == core.config.placeholder {
                continue;
            }
            let at = core.cursor.min(core.data.len());
            core.data.insert(at, b);
            core.cursor = at + 1;
        }
        Ok(())
    }

    /// Remove the byte immediately before the cursor, shifting the tail
    /// left and shrinking the buffer by one. The vacated slot is zeroed.
    pub fn backspace(&mut self) {
        let mut core = self.core.borrow_mut();
        if core.cursor == 0 || core.data.is_empty() {
            return;
        }
        let at = core.cursor - 1;
        let len = core.data.len();
        for i in at..len - 1 {
            core.data[i] = core.data[i + 1];
        }
        core.data[len - 1] = 0;
        core.data.truncate(len - 1);
        core.cursor = at;
    }

    /// Placeholder string covering everything typed so far, for masked
    /// display.
    pub fn masked(&self) -> String {
        let core = self.core.borrow();
        (core.config.placeholder as char).to_string().repeat(core.cursor)
    }

    /// Consume the handle into a finite, non-restartable character stream.
    /// Once the stream is fully exhausted the source is erased (when
    /// configured).
    pub fn stream(self) -> CharStream {
        CharStream {
            core: self.core,
            pos: 0,
            finished: false,
        }
    }

    /// Push the formatted content into a writable sink, then erase the
    /// source (when configured). Returns the number of bytes written.
    pub fn read_into<W: Write>(&mut self, target: &mut W) -> io::Result<usize> {
        let count = {
            let core = self.core.borrow();
            target.write_all(&core.data)?;
            core.data.len()
        };
        if self.core.borrow().config.erase_on_stream {
            self.clearmem();
        }
        Ok(count)
    }

    /// Push the formatted content into a queue-like sink, then erase the
    /// source (when configured).
    pub fn put_into(&mut self, queue: &mut VecDeque<char>) {
        {
            let core = self.core.borrow();
            for &b in &core.data {
                queue.push_back(b as char);
            }
        }
        if self.core.borrow().config.erase_on_stream {
            self.clearmem();
        }
    }

    /// Config-driven destruction. Idempotent; a destroyed buffer has length
    /// zero and every former position was overwritten before release.
    pub fn destroy(&mut self) {
        self.core.borrow_mut().erase();
    }

    /// Unconditional zero-and-truncate, cursor reset to zero. Idempotent.
    pub fn clearmem(&mut self) {
        self.core.borrow_mut().clearmem();
    }

    /// Overwrite every byte with OS randomness, keeping the length.
    pub fn randomize(&mut self) -> Result<(), StashError> {
        let mut core = self.core.borrow_mut();
        random::fill_bytes(&mut core.data)
    }

    /// Destroy this buffer and every live fragment it tracks.
    pub fn erase_all(&mut self) {
        let tracked: Vec<Weak<RefCell<Core>>> =
            self.core.borrow_mut().fragments.drain(..).collect();
        for frag in tracked {
            if let Some(core) = frag.upgrade() {
                core.borrow_mut().erase();
            }
        }
        self.destroy();
    }
}

impl Default for SecureBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Appends `other`'s bytes, then leaves `other` empty: ownership transfer,
/// exactly one live copy of the data exists afterward.
impl AddAssign<SecureBuffer> for SecureBuffer {
    fn add_assign(&mut self, mut other: SecureBuffer) {
        let mut bytes = other.take_bytes();
        self.core.borrow_mut().data.append(&mut bytes);
    }
}

/// Truncation by count: zeroes and removes the trailing `other.len()` bytes,
/// then destroys `other`.
impl SubAssign<SecureBuffer> for SecureBuffer {
    fn sub_assign(&mut self, mut other: SecureBuffer) {
        let n = other.len();
        other.destroy();
        let mut core = self.core.borrow_mut();
        let len = core.data.len();
        let start = len.saturating_sub(n);
        for b in core.data[start..].iter_mut() {
            *b = 0;
        }
        core.data.truncate(start);
        core.cursor = core.cursor.min(start);
    }
}

/// Appends `n` copies of a snapshot of the original content.
impl MulAssign<usize> for SecureBuffer {
    fn mul_assign(&mut self, n: usize) {
        let snapshot = Zeroizing::new(self.core.borrow().data.clone());
        let mut core = self.core.borrow_mut();
        for _ in 0..n {
            core.data.extend_from_slice(&snapshot);
        }
    }
}

impl PartialEq for SecureBuffer {
    fn eq(&self, other: &Self) -> bool {
        if Rc::ptr_eq(&self.core, &other.core) {
            return true;
        }
        self.core.borrow().data == other.core.borrow().data
    }
}

impl Eq for SecureBuffer {}

impl PartialEq<&[u8]> for SecureBuffer {
    fn eq(&self, other: &&[u8]) -> bool {
        *self.bytes() == **other
    }
}

impl<const N: usize> PartialEq<&[u8; N]> for SecureBuffer {
    fn eq(&self, other: &&[u8; N]) -> bool {
        *self.bytes() == other[..]
    }
}

impl PartialEq<&str> for SecureBuffer {
    fn eq(&self, other: &&str) -> bool {
        *self.bytes() == *other.as_bytes()
    }
}

// Never print buffer contents.
impl fmt::Debug for SecureBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecureBuffer[REDACTED {} bytes]", self.len())
    }
}

impl From<Vec<u8>> for SecureBuffer {
    fn from(v: Vec<u8>) -> Self {
        Self::from_input(v, BufferConfig::default())
    }
}

impl From<&[u8]> for SecureBuffer {
    fn from(v: &[u8]) -> Self {
        Self::from_input(v, BufferConfig::default())
    }
}

impl<const N: usize> From<&[u8; N]> for SecureBuffer {
    fn from(v: &[u8; N]) -> Self {
        Self::from_input(v, BufferConfig::default())
    }
}

impl From<String> for SecureBuffer {
    fn from(s: String) -> Self {
        Self::from_input(s, BufferConfig::default())
    }
}

impl From<&str> for SecureBuffer {
    fn from(s: &str) -> Self {
        Self::from_input(s, BufferConfig::default())
    }
}

impl From<u8> for SecureBuffer {
    fn from(b: u8) -> Self {
        Self::from_input(b, BufferConfig::default())
    }
}

impl From<u64> for SecureBuffer {
    fn from(n: u64) -> Self {
        Self::from_input(n, BufferConfig::default())
    }
}

/// Finite, non-restartable stream of formatted characters. Exhausting the
/// stream erases the source as a side effect.
pub struct CharStream {
    core: Rc<RefCell<Core>>,
    pos: usize,
    finished: bool,
}

impl Iterator for CharStream {
    type Item = char;

    fn next(&mut self) -> Option<char> {
        let mut core = self.core.borrow_mut();
        if self.pos < core.data.len() {
            let b = core.data[self.pos];
            self.pos += 1;
            Some(b as char)
        } else {
            if !self.finished {
                self.finished = true;
                if core.config.erase_on_stream {
                    core.clearmem();
                }
            }
            None
        }
    }
}

fn find_in(hay: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if needle.len() > hay.len() {
        return None;
    }
    hay.windows(needle.len()).position(|w| w == needle)
}

fn rfind_in(hay: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(hay.len());
    }
    if needle.len() > hay.len() {
        return None;
    }
    hay.windows(needle.len()).rposition(|w| w == needle)
}
