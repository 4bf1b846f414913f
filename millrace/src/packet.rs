//! Reference-counted packets with headroom, tailroom, and annotations.
//!
//! A [`Packet`] is a window into a shared [`Buffer`] plus an annotation block
//! owned by the packet header itself. Cloning a packet shares the buffer and
//! copies the annotations; mutating packet data first requires
//! [`Packet::uniqueify`], which hands back a [`WritablePacket`] holding the
//! only reference. Encapsulation and decapsulation work in place by moving
//! the window edges with [`push`](Packet::push) / [`pull`](Packet::pull) at
//! the head and [`put`](Packet::put) / [`take`](Packet::take) at the tail.

use std::net::IpAddr;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use byteorder::{ByteOrder, NativeEndian};
use millrace_bytes::{Buffer, BufferPool};

/// Headroom left by the single-argument constructors, enough for common
/// link-layer encapsulations.
pub const DEFAULT_HEADROOM: usize = 28;

/// Smallest buffer the constructors will allocate; slack beyond the request
/// becomes tailroom.
pub const MIN_BUFFER_LENGTH: usize = 64;

/// Extra room added when a window operation must reallocate.
const GROWTH_SLACK: usize = 128;

/// Size in bytes of the fixed annotation area.
pub const ANNO_SIZE: usize = 48;

// Annotation area layout. These offsets are a stable contract with element
// implementations; reorder nothing.
const ANNO_PAINT: usize = 0; // u8
const ANNO_USER_BYTE: usize = 1; // u8
const ANNO_WIFI_RATE: usize = 2; // u8
const ANNO_WIFI_RSSI: usize = 3; // u8
const ANNO_WIFI_RETRIES: usize = 4; // u8
const ANNO_WIFI_TX_FLAGS: usize = 6; // u16
const ANNO_VLAN_TCI: usize = 8; // u16
const ANNO_MAC_OFFSET: usize = 10; // u16, 0xFFFF = unset
const ANNO_NETWORK_OFFSET: usize = 12; // u16, 0xFFFF = unset
const ANNO_TRANSPORT_OFFSET: usize = 14; // u16, 0xFFFF = unset
const ANNO_USER_WORD: usize = 16; // u32
const ANNO_AGGREGATE: usize = 20; // u32

const OFFSET_UNSET: u16 = u16::MAX;

/// Per-packet metadata riding alongside the data window.
///
/// The byte area is opaque to the core; the typed accessors address fixed
/// offsets within it. Timestamps and the destination address do not fit a
/// byte encoding and ride as typed fields. Annotations are owned by the
/// packet header: they survive [`Packet::clone`] by copy and never alias the
/// buffer.
#[derive(Clone)]
pub struct Annotations {
    area: [u8; ANNO_SIZE],
    timestamp: Option<SystemTime>,
    timestamp_steady: Option<Instant>,
    dst: Option<IpAddr>,
}

impl Default for Annotations {
    fn default() -> Self {
        let mut area = [0u8; ANNO_SIZE];
        NativeEndian::write_u16(&mut area[ANNO_MAC_OFFSET..], OFFSET_UNSET);
        NativeEndian::write_u16(&mut area[ANNO_NETWORK_OFFSET..], OFFSET_UNSET);
        NativeEndian::write_u16(&mut area[ANNO_TRANSPORT_OFFSET..], OFFSET_UNSET);
        Annotations {
            area,
            timestamp: None,
            timestamp_steady: None,
            dst: None,
        }
    }
}

impl Annotations {
    /// Raw read access to the annotation area.
    pub fn area(&self) -> &[u8; ANNO_SIZE] {
        &self.area
    }

    /// Raw write access to the annotation area.
    pub fn area_mut(&mut self) -> &mut [u8; ANNO_SIZE] {
        &mut self.area
    }

    /// The wall-clock timestamp, if stamped.
    pub fn timestamp(&self) -> Option<SystemTime> {
        self.timestamp
    }

    /// Sets the wall-clock timestamp.
    pub fn set_timestamp(&mut self, when: SystemTime) {
        self.timestamp = Some(when);
    }

    /// The steady-clock timestamp, if stamped.
    pub fn timestamp_steady(&self) -> Option<Instant> {
        self.timestamp_steady
    }

    /// Sets the steady-clock timestamp.
    pub fn set_timestamp_steady(&mut self, when: Instant) {
        self.timestamp_steady = Some(when);
    }

    /// Stamps both clocks with the current time.
    pub fn stamp_now(&mut self) {
        self.timestamp = Some(SystemTime::now());
        self.timestamp_steady = Some(Instant::now());
    }

    /// The destination address annotation.
    pub fn dst(&self) -> Option<IpAddr> {
        self.dst
    }

    /// Sets the destination address annotation.
    pub fn set_dst(&mut self, addr: IpAddr) {
        self.dst = Some(addr);
    }

    /// The paint annotation.
    pub fn paint(&self) -> u8 {
        self.area[ANNO_PAINT]
    }

    /// Sets the paint annotation.
    pub fn set_paint(&mut self, paint: u8) {
        self.area[ANNO_PAINT] = paint;
    }

    /// The user byte slot.
    pub fn user_byte(&self) -> u8 {
        self.area[ANNO_USER_BYTE]
    }

    /// Sets the user byte slot.
    pub fn set_user_byte(&mut self, value: u8) {
        self.area[ANNO_USER_BYTE] = value;
    }

    /// The user word slot.
    pub fn user_word(&self) -> u32 {
        NativeEndian::read_u32(&self.area[ANNO_USER_WORD..])
    }

    /// Sets the user word slot.
    pub fn set_user_word(&mut self, value: u32) {
        NativeEndian::write_u32(&mut self.area[ANNO_USER_WORD..], value);
    }

    /// The aggregate identifier.
    pub fn aggregate(&self) -> u32 {
        NativeEndian::read_u32(&self.area[ANNO_AGGREGATE..])
    }

    /// Sets the aggregate identifier.
    pub fn set_aggregate(&mut self, value: u32) {
        NativeEndian::write_u32(&mut self.area[ANNO_AGGREGATE..], value);
    }

    /// The VLAN tag control information.
    pub fn vlan_tci(&self) -> u16 {
        NativeEndian::read_u16(&self.area[ANNO_VLAN_TCI..])
    }

    /// Sets the VLAN tag control information.
    pub fn set_vlan_tci(&mut self, tci: u16) {
        NativeEndian::write_u16(&mut self.area[ANNO_VLAN_TCI..], tci);
    }

    /// The MAC header offset within the data window, if set.
    pub fn mac_header_offset(&self) -> Option<u16> {
        decode_offset(NativeEndian::read_u16(&self.area[ANNO_MAC_OFFSET..]))
    }

    /// Sets the MAC header offset.
    pub fn set_mac_header_offset(&mut self, offset: u16) {
        NativeEndian::write_u16(&mut self.area[ANNO_MAC_OFFSET..], offset);
    }

    /// The network header offset within the data window, if set.
    pub fn network_header_offset(&self) -> Option<u16> {
        decode_offset(NativeEndian::read_u16(&self.area[ANNO_NETWORK_OFFSET..]))
    }

    /// Sets the network header offset.
    pub fn set_network_header_offset(&mut self, offset: u16) {
        NativeEndian::write_u16(&mut self.area[ANNO_NETWORK_OFFSET..], offset);
    }

    /// The transport header offset within the data window, if set.
    pub fn transport_header_offset(&self) -> Option<u16> {
        decode_offset(NativeEndian::read_u16(&self.area[ANNO_TRANSPORT_OFFSET..]))
    }

    /// Sets the transport header offset.
    pub fn set_transport_header_offset(&mut self, offset: u16) {
        NativeEndian::write_u16(&mut self.area[ANNO_TRANSPORT_OFFSET..], offset);
    }

    /// Clears all three header offsets.
    pub fn clear_header_offsets(&mut self) {
        NativeEndian::write_u16(&mut self.area[ANNO_MAC_OFFSET..], OFFSET_UNSET);
        NativeEndian::write_u16(&mut self.area[ANNO_NETWORK_OFFSET..], OFFSET_UNSET);
        NativeEndian::write_u16(&mut self.area[ANNO_TRANSPORT_OFFSET..], OFFSET_UNSET);
    }

    /// The wireless transmit rate annotation.
    pub fn wifi_rate(&self) -> u8 {
        self.area[ANNO_WIFI_RATE]
    }

    /// Sets the wireless transmit rate annotation.
    pub fn set_wifi_rate(&mut self, rate: u8) {
        self.area[ANNO_WIFI_RATE] = rate;
    }

    /// The received signal strength annotation.
    pub fn wifi_rssi(&self) -> u8 {
        self.area[ANNO_WIFI_RSSI]
    }

    /// Sets the received signal strength annotation.
    pub fn set_wifi_rssi(&mut self, rssi: u8) {
        self.area[ANNO_WIFI_RSSI] = rssi;
    }

    /// The wireless retry count annotation.
    pub fn wifi_retries(&self) -> u8 {
        self.area[ANNO_WIFI_RETRIES]
    }

    /// Sets the wireless retry count annotation.
    pub fn set_wifi_retries(&mut self, retries: u8) {
        self.area[ANNO_WIFI_RETRIES] = retries;
    }

    /// The wireless transmit flags annotation.
    pub fn wifi_tx_flags(&self) -> u16 {
        NativeEndian::read_u16(&self.area[ANNO_WIFI_TX_FLAGS..])
    }

    /// Sets the wireless transmit flags annotation.
    pub fn set_wifi_tx_flags(&mut self, flags: u16) {
        NativeEndian::write_u16(&mut self.area[ANNO_WIFI_TX_FLAGS..], flags);
    }
}

fn decode_offset(raw: u16) -> Option<u16> {
    if raw == OFFSET_UNSET {
        None
    } else {
        Some(raw)
    }
}

/// A packet: a shared buffer, a data window into it, and annotations.
pub struct Packet {
    buffer: Buffer,
    data: usize,
    length: usize,
    anno: Annotations,
}

impl Packet {
    /// Allocates a packet of `length` zero bytes with [`DEFAULT_HEADROOM`].
    ///
    /// Returns `None` when the requested geometry overflows.
    pub fn make(length: usize) -> Option<Packet> {
        Packet::make_with(DEFAULT_HEADROOM, None, length, 0)
    }

    /// Allocates a packet whose data window holds a copy of `data`, with
    /// [`DEFAULT_HEADROOM`].
    pub fn from_data(data: &[u8]) -> Option<Packet> {
        Packet::make_with(DEFAULT_HEADROOM, Some(data), data.len(), 0)
    }

    /// Allocates a packet with explicit geometry.
    ///
    /// The buffer holds `headroom + length + tailroom` bytes, padded up to
    /// [`MIN_BUFFER_LENGTH`] with the slack going to tailroom. When `src` is
    /// provided, its first `length` bytes fill the data window; otherwise the
    /// window is zeroed. Returns `None` when the geometry overflows or `src`
    /// is shorter than `length`.
    pub fn make_with(
        headroom: usize,
        src: Option<&[u8]>,
        length: usize,
        tailroom: usize,
    ) -> Option<Packet> {
        if let Some(src) = src {
            if src.len() < length {
                return None;
            }
        }
        let want = headroom
            .checked_add(length)?
            .checked_add(tailroom)?;
        let capacity = want.max(MIN_BUFFER_LENGTH);
        let mut buffer = Buffer::alloc(capacity);
        if let Some(src) = src {
            let slice = buffer.as_mut_slice()?;
            slice[headroom..headroom + length].copy_from_slice(&src[..length]);
        }
        Some(Packet {
            buffer,
            data: headroom,
            length,
            anno: Annotations::default(),
        })
    }

    /// Wraps storage provided by a driver; the window is `[data, data +
    /// length)` and the storage returns to `pool` when the last reference
    /// drops.
    ///
    /// Returns `None` when the window exceeds the storage.
    pub fn from_storage(
        storage: Box<[u8]>,
        data: usize,
        length: usize,
        pool: Option<Arc<dyn BufferPool>>,
    ) -> Option<Packet> {
        if data.checked_add(length)? > storage.len() {
            return None;
        }
        let buffer = match pool {
            Some(pool) => Buffer::from_pool(storage, pool),
            None => Buffer::from_storage(storage),
        };
        Some(Packet {
            buffer,
            data,
            length,
            anno: Annotations::default(),
        })
    }

    /// The data window length.
    pub fn len(&self) -> usize {
        self.length
    }

    /// True when the data window is empty.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// The data window.
    pub fn data(&self) -> &[u8] {
        &self.buffer.as_slice()[self.data..self.data + self.length]
    }

    /// Unused bytes before the data window.
    pub fn headroom(&self) -> usize {
        self.data
    }

    /// Unused bytes after the data window.
    pub fn tailroom(&self) -> usize {
        self.buffer.len() - (self.data + self.length)
    }

    /// The total buffer capacity.
    pub fn buffer_length(&self) -> usize {
        self.buffer.len()
    }

    /// True when another packet shares this packet's buffer.
    pub fn shared(&self) -> bool {
        !self.buffer.is_unique()
    }

    /// The number of packets sharing this packet's buffer.
    pub fn ref_count(&self) -> usize {
        self.buffer.ref_count()
    }

    /// Read access to the annotations.
    pub fn anno(&self) -> &Annotations {
        &self.anno
    }

    /// Write access to the annotations.
    ///
    /// Annotations belong to the packet header, so writing them never
    /// requires the buffer to be unique.
    pub fn anno_mut(&mut self) -> &mut Annotations {
        &mut self.anno
    }

    /// Releases this reference to the packet.
    ///
    /// Dropping the packet has the same effect; `kill` exists to make the
    /// release explicit at call sites that would otherwise look like a leak.
    pub fn kill(self) {}

    /// Ensures this packet holds the only reference to its buffer.
    ///
    /// When the buffer is already unique this is free. Otherwise the buffer
    /// contents are copied into a fresh allocation of identical geometry; the
    /// window and annotations are preserved exactly.
    pub fn uniqueify(mut self) -> WritablePacket {
        if !self.buffer.is_unique() {
            let mut copy = Buffer::alloc(self.buffer.len());
            if let Some(slice) = copy.as_mut_slice() {
                slice.copy_from_slice(self.buffer.as_slice());
            }
            self.buffer = copy;
        }
        WritablePacket { packet: self }
    }

    /// Grows the data window at the head by `n` bytes.
    ///
    /// Uses headroom when available; otherwise reallocates with extra slack.
    /// Returns `None` on geometry overflow.
    pub fn push(self, n: usize) -> Option<WritablePacket> {
        if self.data >= n {
            let mut w = self.uniqueify();
            w.packet.data -= n;
            w.packet.length += n;
            Some(w)
        } else {
            self.expand(n + GROWTH_SLACK, 0, n, 0)
        }
    }

    /// Grows the data window at the tail by `n` bytes.
    ///
    /// Uses tailroom when available; otherwise reallocates with extra slack.
    /// Returns `None` on geometry overflow.
    pub fn put(self, n: usize) -> Option<WritablePacket> {
        if self.tailroom() >= n {
            let mut w = self.uniqueify();
            w.packet.length += n;
            Some(w)
        } else {
            self.expand(0, n + GROWTH_SLACK, 0, n)
        }
    }

    /// Shrinks the data window at the head by `n` bytes.
    ///
    /// Shrinking past the window end clamps to an empty window.
    pub fn pull(&mut self, n: usize) {
        let n = n.min(self.length);
        self.data += n;
        self.length -= n;
    }

    /// Shrinks the data window at the tail by `n` bytes.
    ///
    /// Shrinking past the window start clamps to an empty window.
    pub fn take(&mut self, n: usize) {
        self.length -= n.min(self.length);
    }

    /// Reallocates with `extra_head`/`extra_tail` additional room, then grows
    /// the window by `grow_head`/`grow_tail`.
    fn expand(
        self,
        extra_head: usize,
        extra_tail: usize,
        grow_head: usize,
        grow_tail: usize,
    ) -> Option<WritablePacket> {
        let headroom = self.data.checked_add(extra_head)?;
        let capacity = headroom
            .checked_add(self.length)?
            .checked_add(self.tailroom())?
            .checked_add(extra_tail)?;
        let mut buffer = Buffer::alloc(capacity);
        {
            let slice = buffer.as_mut_slice()?;
            slice[headroom..headroom + self.length].copy_from_slice(self.data());
        }
        let mut packet = Packet {
            buffer,
            data: headroom,
            length: self.length,
            anno: self.anno.clone(),
        };
        packet.data -= grow_head;
        packet.length += grow_head + grow_tail;
        Some(WritablePacket { packet })
    }
}

impl Clone for Packet {
    /// Shares the buffer and copies the annotations.
    fn clone(&self) -> Packet {
        Packet {
            buffer: self.buffer.clone(),
            data: self.data,
            length: self.length,
            anno: self.anno.clone(),
        }
    }
}

impl std::fmt::Debug for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Packet")
            .field("length", &self.length)
            .field("headroom", &self.headroom())
            .field("tailroom", &self.tailroom())
            .field("refs", &self.ref_count())
            .finish()
    }
}

/// A packet holding the only reference to its buffer.
///
/// Obtained from [`Packet::uniqueify`] and the window-growing operations.
/// `WritablePacket` cannot be cloned, so uniqueness holds for its lifetime;
/// convert back with [`WritablePacket::into_packet`] to share again.
pub struct WritablePacket {
    packet: Packet,
}

impl WritablePacket {
    /// Mutable access to the data window.
    pub fn data_mut(&mut self) -> &mut [u8] {
        let (data, length) = (self.packet.data, self.packet.length);
        let slice = self
            .packet
            .buffer
            .as_mut_slice()
            .expect("writable packet buffer must be uniquely held");
        &mut slice[data..data + length]
    }

    /// Moves the data window so that `new_headroom` bytes precede it,
    /// shifting the contents within the buffer.
    ///
    /// Returns false (leaving the packet unchanged) when the window would not
    /// fit.
    pub fn shift_data(&mut self, new_headroom: usize) -> bool {
        let length = self.packet.length;
        let old = self.packet.data;
        match new_headroom.checked_add(length) {
            Some(end) if end <= self.packet.buffer.len() => {
                let slice = self
                    .packet
                    .buffer
                    .as_mut_slice()
                    .expect("writable packet buffer must be uniquely held");
                slice.copy_within(old..old + length, new_headroom);
                self.packet.data = new_headroom;
                true
            }
            _ => false,
        }
    }

    /// Converts back into a shareable packet.
    pub fn into_packet(self) -> Packet {
        self.packet
    }
}

impl Deref for WritablePacket {
    type Target = Packet;
    fn deref(&self) -> &Packet {
        &self.packet
    }
}

impl DerefMut for WritablePacket {
    fn deref_mut(&mut self) -> &mut Packet {
        &mut self.packet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_invariants() {
        let p = Packet::make_with(10, None, 20, 6).unwrap();
        assert_eq!(p.headroom(), 10);
        assert_eq!(p.len(), 20);
        // Short allocations pad up to the minimum, slack to the tail.
        assert_eq!(p.buffer_length(), MIN_BUFFER_LENGTH);
        assert_eq!(p.tailroom(), MIN_BUFFER_LENGTH - 30);
        assert_eq!(p.ref_count(), 1);
    }

    #[test]
    fn from_data_copies_window() {
        let p = Packet::from_data(b"abc").unwrap();
        assert_eq!(p.data(), b"abc");
        assert_eq!(p.headroom(), DEFAULT_HEADROOM);
    }

    #[test]
    fn clone_shares_buffer_copies_annotations() {
        let mut p = Packet::from_data(b"hello").unwrap();
        p.anno_mut().set_paint(3);
        let mut q = p.clone();
        assert_eq!(p.ref_count(), 2);
        assert_eq!(q.data(), p.data());
        assert_eq!(q.anno().paint(), 3);

        // Annotations are independent after the clone.
        q.anno_mut().set_paint(9);
        assert_eq!(p.anno().paint(), 3);
    }

    #[test]
    fn uniqueify_preserves_window_and_annotations() {
        let mut p = Packet::make_with(8, Some(b"datadata"), 8, 4).unwrap();
        p.anno_mut().set_user_word(0xdead_beef);
        let q = p.clone();

        let w = p.uniqueify();
        assert_eq!(w.ref_count(), 1);
        assert_eq!(w.headroom(), 8);
        assert_eq!(w.data(), b"datadata");
        assert_eq!(w.anno().user_word(), 0xdead_beef);

        // The original clone still sees its own copy of the data.
        assert_eq!(q.data(), b"datadata");
        assert_eq!(q.ref_count(), 1);
    }

    #[test]
    fn uniqueify_of_unique_packet_is_free() {
        let p = Packet::from_data(b"x").unwrap();
        let w = p.uniqueify();
        assert_eq!(w.ref_count(), 1);
    }

    #[test]
    fn push_within_headroom() {
        let p = Packet::make_with(8, Some(b"body"), 4, 0).unwrap();
        let mut w = p.push(4).unwrap();
        assert_eq!(w.headroom(), 4);
        assert_eq!(w.len(), 8);
        w.data_mut()[..4].copy_from_slice(b"head");
        assert_eq!(&w.data()[..8], b"headbody");

        // Pulling the header back off recovers the original window.
        let mut p = w.into_packet();
        p.pull(4);
        assert_eq!(p.data(), b"body");
    }

    #[test]
    fn push_reallocates_when_headroom_exhausted() {
        let p = Packet::make_with(2, Some(b"payload"), 7, 0).unwrap();
        let w = p.push(10).unwrap();
        assert_eq!(w.len(), 17);
        assert_eq!(&w.data()[10..], b"payload");
        assert!(w.headroom() >= GROWTH_SLACK - 8);
    }

    #[test]
    fn put_take_round_trip() {
        let p = Packet::from_data(b"abc").unwrap();
        let w = p.put(5).unwrap();
        assert_eq!(w.len(), 8);
        let mut p = w.into_packet();
        p.take(5);
        assert_eq!(p.data(), b"abc");
    }

    #[test]
    fn put_reallocates_when_tailroom_exhausted() {
        let p = Packet::make_with(0, Some(&[7u8; 70]), 70, 0).unwrap();
        assert_eq!(p.tailroom(), 0);
        let w = p.put(16).unwrap();
        assert_eq!(w.len(), 86);
        assert_eq!(&w.data()[..70], &[7u8; 70][..]);
    }

    #[test]
    fn pull_and_take_clamp() {
        let mut p = Packet::from_data(b"abc").unwrap();
        p.pull(100);
        assert_eq!(p.len(), 0);
        let mut p = Packet::from_data(b"abc").unwrap();
        p.take(100);
        assert_eq!(p.len(), 0);
    }

    #[test]
    fn clone_kill_balance_frees_once() {
        struct Pool(std::sync::Mutex<usize>);
        impl BufferPool for Pool {
            fn recycle(&self, _bytes: Box<[u8]>) {
                *self.0.lock().unwrap() += 1;
            }
        }
        let pool = Arc::new(Pool(std::sync::Mutex::new(0)));
        let p = Packet::from_storage(
            vec![0u8; 128].into_boxed_slice(),
            28,
            64,
            Some(pool.clone()),
        )
        .unwrap();
        let q = p.clone();
        let r = q.clone();
        p.kill();
        q.kill();
        assert_eq!(*pool.0.lock().unwrap(), 0);
        r.kill();
        assert_eq!(*pool.0.lock().unwrap(), 1);
    }

    #[test]
    fn header_offsets_default_unset() {
        let mut p = Packet::make(10).unwrap();
        assert_eq!(p.anno().mac_header_offset(), None);
        assert_eq!(p.anno().network_header_offset(), None);
        assert_eq!(p.anno().transport_header_offset(), None);
        p.anno_mut().set_network_header_offset(14);
        assert_eq!(p.anno().network_header_offset(), Some(14));
        p.anno_mut().clear_header_offsets();
        assert_eq!(p.anno().network_header_offset(), None);
    }

    #[test]
    fn annotation_slots_round_trip() {
        let mut p = Packet::make(1).unwrap();
        let a = p.anno_mut();
        a.set_user_byte(5);
        a.set_user_word(77);
        a.set_aggregate(123456);
        a.set_vlan_tci(0x3001);
        a.set_wifi_rate(54);
        a.set_wifi_rssi(200);
        a.set_wifi_retries(2);
        a.set_wifi_tx_flags(0x0102);
        a.set_dst(IpAddr::from([10, 0, 0, 1]));
        assert_eq!(p.anno().user_byte(), 5);
        assert_eq!(p.anno().user_word(), 77);
        assert_eq!(p.anno().aggregate(), 123456);
        assert_eq!(p.anno().vlan_tci(), 0x3001);
        assert_eq!(p.anno().wifi_rate(), 54);
        assert_eq!(p.anno().wifi_rssi(), 200);
        assert_eq!(p.anno().wifi_retries(), 2);
        assert_eq!(p.anno().wifi_tx_flags(), 0x0102);
        assert_eq!(p.anno().dst(), Some(IpAddr::from([10, 0, 0, 1])));
    }

    #[test]
    fn shift_data_moves_window() {
        let p = Packet::make_with(10, Some(b"abcd"), 4, 10).unwrap();
        let mut w = p.uniqueify();
        assert!(w.shift_data(2));
        assert_eq!(w.headroom(), 2);
        assert_eq!(w.data(), b"abcd");
        assert!(!w.shift_data(usize::MAX));
    }
}
