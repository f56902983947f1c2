//! 目标选择状态机
//! Track selection state machine with buffered multi-digit input
//!
//! 键盘输入逐位缓冲, 回车确认后与当前帧活跃ID集合比对:
//! - 数字键: 追加到缓冲区并重置超时
//! - 回车:   解析缓冲区, ID在场则选中, 不在场则仅提示
//! - 退格/ESC: 清空缓冲区
//! - 清除键: 清空缓冲区并取消选中
//! - 超时:   缓冲30帧无后续输入则放弃
//!
//! 状态作为显式值在处理循环中传递, 不依赖任何全局变量

use std::collections::BTreeSet;

/// 缓冲区超时帧数 (30fps下约1秒)
pub const BUFFER_TIMEOUT_FRAMES: u32 = 30;

// ========== 输入事件 ==========

/// 每帧消费的离散键盘事件
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyEvent {
    /// 数字键 0-9
    Digit(u8),
    /// 回车: 确认缓冲区内容
    Confirm,
    /// 退格/ESC: 放弃缓冲区内容
    Cancel,
    /// 清除选中目标
    ClearSelection,
    /// 退出程序
    Quit,
}

/// 单个键盘事件产生的状态转移结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    /// 无状态变化
    None,
    /// 数字已追加到缓冲区
    Buffered,
    /// 缓冲区已清空 (取消或空确认)
    BufferCleared,
    /// 确认成功, 选中该ID
    Selected(u32),
    /// 确认失败, ID不在当前帧 (软失败, 仅提示)
    Rejected(u32),
    /// 确认失败, 缓冲区数值超出范围
    RejectedUnparseable(String),
    /// 选中目标已清除
    SelectionCleared,
    /// 请求退出主循环
    QuitRequested,
}

// ========== 状态机 ==========

/// 状态机当前所处状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// 缓冲区为空, 无待定输入
    Idle,
    /// 缓冲区非空, 超时计数递减中
    Buffering,
}

/// 选择状态 (缓冲区 + 超时计数 + 已确认选中ID)
#[derive(Clone, Debug, Default)]
pub struct SelectionState {
    /// 待确认的数字缓冲区 (仅含十进制数字字符)
    buffer: String,

    /// 剩余超时帧数, 每个数字键重置为 BUFFER_TIMEOUT_FRAMES
    timeout: u32,

    /// 已确认的选中ID
    ///
    /// 仅由确认成功写入, 仅由清除键置空; ID暂时离场时保留不变,
    /// 渲染端每帧自行检查在场性并回退到全景视图
    selected: Option<u32>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        if self.buffer.is_empty() {
            Phase::Idle
        } else {
            Phase::Buffering
        }
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn selected(&self) -> Option<u32> {
        self.selected
    }

    /// 消费一个键盘事件
    ///
    /// 同一帧内的多个事件按到达顺序逐个调用, 每个事件作用于前一个
    /// 事件留下的缓冲区状态; `active` 为当前帧的活跃ID集合
    pub fn apply_key(&mut self, key: KeyEvent, active: &BTreeSet<u32>) -> Transition {
        match key {
            KeyEvent::Digit(d) => {
                debug_assert!(d <= 9);
                self.buffer.push((b'0' + d) as char);
                self.timeout = BUFFER_TIMEOUT_FRAMES;
                Transition::Buffered
            }
            KeyEvent::Confirm => {
                if self.buffer.is_empty() {
                    return Transition::None;
                }
                let entered = self.buffer.clone();
                self.clear_buffer();
                match entered.parse::<u32>() {
                    Ok(id) if active.contains(&id) => {
                        self.selected = Some(id);
                        Transition::Selected(id)
                    }
                    Ok(id) => Transition::Rejected(id),
                    // 缓冲区只会含数字字符, 仅溢出时到达此分支
                    Err(_) => Transition::RejectedUnparseable(entered),
                }
            }
            KeyEvent::Cancel => {
                self.clear_buffer();
                Transition::BufferCleared
            }
            KeyEvent::ClearSelection => {
                self.clear_buffer();
                self.selected = None;
                Transition::SelectionCleared
            }
            KeyEvent::Quit => Transition::QuitRequested,
        }
    }

    /// 帧尾节拍, 每处理一帧恰好调用一次 (在该帧所有键盘事件之后)
    ///
    /// 缓冲区非空时递减超时计数, 归零则放弃待定输入; 选中ID不受影响
    pub fn tick(&mut self) -> bool {
        if self.buffer.is_empty() {
            return false;
        }
        self.timeout = self.timeout.saturating_sub(1);
        if self.timeout == 0 {
            self.clear_buffer();
            return true;
        }
        false
    }

    fn clear_buffer(&mut self) {
        self.buffer.clear();
        self.timeout = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active(ids: &[u32]) -> BTreeSet<u32> {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_digit_buffers_and_starts_timeout() {
        let mut s = SelectionState::new();
        assert_eq!(s.phase(), Phase::Idle);

        assert_eq!(s.apply_key(KeyEvent::Digit(4), &active(&[])), Transition::Buffered);
        assert_eq!(s.apply_key(KeyEvent::Digit(2), &active(&[])), Transition::Buffered);
        assert_eq!(s.buffer(), "42");
        assert_eq!(s.phase(), Phase::Buffering);
    }

    #[test]
    fn test_confirm_selects_active_id() {
        let mut s = SelectionState::new();
        s.apply_key(KeyEvent::Digit(7), &active(&[1, 7, 9]));
        let t = s.apply_key(KeyEvent::Confirm, &active(&[1, 7, 9]));
        assert_eq!(t, Transition::Selected(7));
        assert_eq!(s.selected(), Some(7));
        assert_eq!(s.buffer(), "");
        assert_eq!(s.phase(), Phase::Idle);
    }

    #[test]
    fn test_confirm_miss_keeps_previous_selection() {
        let mut s = SelectionState::new();
        s.apply_key(KeyEvent::Digit(5), &active(&[3, 5, 9]));
        s.apply_key(KeyEvent::Confirm, &active(&[3, 5, 9]));
        assert_eq!(s.selected(), Some(5));

        // "99" 不在 {1,2,3}: 选中不变, 缓冲区清空
        s.apply_key(KeyEvent::Digit(9), &active(&[1, 2, 3]));
        s.apply_key(KeyEvent::Digit(9), &active(&[1, 2, 3]));
        let t = s.apply_key(KeyEvent::Confirm, &active(&[1, 2, 3]));
        assert_eq!(t, Transition::Rejected(99));
        assert_eq!(s.selected(), Some(5));
        assert_eq!(s.buffer(), "");
    }

    #[test]
    fn test_confirm_empty_buffer_is_noop() {
        let mut s = SelectionState::new();
        assert_eq!(s.apply_key(KeyEvent::Confirm, &active(&[1])), Transition::None);
        assert_eq!(s.selected(), None);
        assert_eq!(s.phase(), Phase::Idle);
    }

    #[test]
    fn test_cancel_clears_whole_buffer() {
        // 退格清空整个缓冲区, 而非删除单个字符
        let mut s = SelectionState::new();
        s.apply_key(KeyEvent::Digit(1), &active(&[3]));
        s.apply_key(KeyEvent::Digit(2), &active(&[3]));
        assert_eq!(s.apply_key(KeyEvent::Cancel, &active(&[3])), Transition::BufferCleared);
        assert_eq!(s.buffer(), "");

        s.apply_key(KeyEvent::Digit(3), &active(&[3]));
        assert_eq!(s.buffer(), "3");
        let t = s.apply_key(KeyEvent::Confirm, &active(&[3]));
        assert_eq!(t, Transition::Selected(3));
    }

    #[test]
    fn test_cancel_leaves_selection_untouched() {
        let mut s = SelectionState::new();
        s.apply_key(KeyEvent::Digit(3), &active(&[3]));
        s.apply_key(KeyEvent::Confirm, &active(&[3]));
        s.apply_key(KeyEvent::Digit(8), &active(&[3]));
        s.apply_key(KeyEvent::Cancel, &active(&[3]));
        assert_eq!(s.selected(), Some(3));
    }

    #[test]
    fn test_clear_selection_resets_everything() {
        let mut s = SelectionState::new();
        s.apply_key(KeyEvent::Digit(3), &active(&[3]));
        s.apply_key(KeyEvent::Confirm, &active(&[3]));
        s.apply_key(KeyEvent::Digit(9), &active(&[3]));

        let t = s.apply_key(KeyEvent::ClearSelection, &active(&[3]));
        assert_eq!(t, Transition::SelectionCleared);
        assert_eq!(s.selected(), None);
        assert_eq!(s.buffer(), "");
        assert_eq!(s.phase(), Phase::Idle);
    }

    #[test]
    fn test_timeout_abandons_buffer_after_30_frames() {
        let mut s = SelectionState::new();
        s.apply_key(KeyEvent::Digit(3), &active(&[3]));
        s.apply_key(KeyEvent::Confirm, &active(&[3]));

        s.apply_key(KeyEvent::Digit(1), &active(&[3]));
        s.apply_key(KeyEvent::Digit(2), &active(&[3]));

        // 29帧后仍在缓冲
        for _ in 0..BUFFER_TIMEOUT_FRAMES - 1 {
            assert!(!s.tick());
        }
        assert_eq!(s.buffer(), "12");

        // 第30帧超时, 输入放弃, 选中不变
        assert!(s.tick());
        assert_eq!(s.buffer(), "");
        assert_eq!(s.phase(), Phase::Idle);
        assert_eq!(s.selected(), Some(3));
    }

    #[test]
    fn test_digit_resets_timeout() {
        let mut s = SelectionState::new();
        s.apply_key(KeyEvent::Digit(1), &active(&[]));
        for _ in 0..BUFFER_TIMEOUT_FRAMES - 1 {
            s.tick();
        }
        // 最后一刻追加数字, 重新计时
        s.apply_key(KeyEvent::Digit(2), &active(&[]));
        for _ in 0..BUFFER_TIMEOUT_FRAMES - 1 {
            assert!(!s.tick());
        }
        assert_eq!(s.buffer(), "12");
        assert!(s.tick());
        assert_eq!(s.buffer(), "");
    }

    #[test]
    fn test_tick_noop_when_idle() {
        let mut s = SelectionState::new();
        for _ in 0..100 {
            assert!(!s.tick());
        }
        assert_eq!(s.phase(), Phase::Idle);
    }

    #[test]
    fn test_overflowing_buffer_is_soft_miss() {
        let mut s = SelectionState::new();
        for _ in 0..12 {
            s.apply_key(KeyEvent::Digit(9), &active(&[1]));
        }
        let t = s.apply_key(KeyEvent::Confirm, &active(&[1]));
        assert!(matches!(t, Transition::RejectedUnparseable(_)));
        assert_eq!(s.selected(), None);
        assert_eq!(s.buffer(), "");
    }

    #[test]
    fn test_quit_has_no_state_effect() {
        let mut s = SelectionState::new();
        s.apply_key(KeyEvent::Digit(3), &active(&[3]));
        s.apply_key(KeyEvent::Confirm, &active(&[3]));
        s.apply_key(KeyEvent::Digit(5), &active(&[3]));

        assert_eq!(s.apply_key(KeyEvent::Quit, &active(&[3])), Transition::QuitRequested);
        assert_eq!(s.selected(), Some(3));
        assert_eq!(s.buffer(), "5");
    }

    #[test]
    fn test_events_apply_in_arrival_order() {
        // ['1','2',Backspace,'3',Enter] 且 {3} 在场 → 选中3
        let ids = active(&[3]);
        let mut s = SelectionState::new();
        let keys = [
            KeyEvent::Digit(1),
            KeyEvent::Digit(2),
            KeyEvent::Cancel,
            KeyEvent::Digit(3),
            KeyEvent::Confirm,
        ];
        let mut last = Transition::None;
        for k in keys {
            last = s.apply_key(k, &ids);
        }
        assert_eq!(last, Transition::Selected(3));
        assert_eq!(s.selected(), Some(3));
    }
}
