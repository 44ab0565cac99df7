//! 대기 버퍼 -- 처리 주기 사이에 수집된 라인을 보관합니다.
//!
//! 처리 태스크는 주기마다 [`LogBuffer::take_all`]로 버퍼 전체를 한 번에 교체해 가져갑니다.
//! 가득 찬 상태에서의 동작은 [`DropPolicy`]가 정합니다.

use std::collections::VecDeque;

use crate::collector::RawLine;
use crate::config::DropPolicy;

/// 인메모리 대기 버퍼
pub struct LogBuffer {
    lines: VecDeque<RawLine>,
    capacity: usize,
    policy: DropPolicy,
}

impl LogBuffer {
    /// 새 버퍼를 생성합니다.
    pub fn new(capacity: usize, policy: DropPolicy) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(10_000)),
            capacity,
            policy,
        }
    }

    /// 라인을 추가하고, 용량 초과로 버려진 라인이 있으면 돌려줍니다.
    ///
    /// `Oldest`는 가장 오래된 라인을, `Newest`는 들어온 라인 자체를 버립니다.
    pub fn push(&mut self, line: RawLine) -> Option<RawLine> {
        if self.lines.len() < self.capacity {
            self.lines.push_back(line);
            return None;
        }
        match self.policy {
            DropPolicy::Oldest => {
                let evicted = self.lines.pop_front();
                self.lines.push_back(line);
                evicted
            }
            DropPolicy::Newest => Some(line),
        }
    }

    /// 버퍼 전체를 빈 버퍼와 교체하여 반환합니다.
    pub fn take_all(&mut self) -> Vec<RawLine> {
        Vec::from(std::mem::take(&mut self.lines))
    }

    /// 현재 라인 수
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// 버퍼가 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// 채움 비율 (0.0~1.0)
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.lines.len() as f64 / self.capacity as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(msg: &str) -> RawLine {
        RawLine::new(msg.to_owned(), "test")
    }

    fn texts(lines: &[RawLine]) -> Vec<String> {
        lines.iter().map(RawLine::text).collect()
    }

    #[test]
    fn take_all_swaps_in_empty_buffer() {
        let mut buf = LogBuffer::new(100, DropPolicy::Oldest);
        for msg in ["a", "b", "c"] {
            assert!(buf.push(line(msg)).is_none());
        }
        assert_eq!(buf.len(), 3);

        assert_eq!(texts(&buf.take_all()), vec!["a", "b", "c"]);
        assert!(buf.is_empty());
        assert!(buf.take_all().is_empty());
    }

    #[test]
    fn oldest_policy_evicts_front() {
        let mut buf = LogBuffer::new(3, DropPolicy::Oldest);
        for msg in ["1", "2", "3"] {
            buf.push(line(msg));
        }

        let evicted = buf.push(line("4")).unwrap();
        assert_eq!(evicted.text(), "1");
        assert_eq!(texts(&buf.take_all()), vec!["2", "3", "4"]);
    }

    #[test]
    fn newest_policy_rejects_incoming() {
        let mut buf = LogBuffer::new(2, DropPolicy::Newest);
        buf.push(line("1"));
        buf.push(line("2"));

        let rejected = buf.push(line("3")).unwrap();
        assert_eq!(rejected.text(), "3");
        assert_eq!(texts(&buf.take_all()), vec!["1", "2"]);
    }

    #[test]
    fn utilization_tracks_fill_level() {
        let mut buf = LogBuffer::new(4, DropPolicy::Oldest);
        assert_eq!(buf.utilization(), 0.0);
        buf.push(line("a"));
        assert_eq!(buf.utilization(), 0.25);
        buf.take_all();
        assert_eq!(buf.utilization(), 0.0);
    }
}
