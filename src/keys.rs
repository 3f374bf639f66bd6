//! Keyboard keys a keyed device can bind zones to, and the pitch palette that
//! maps the twelve pitch classes onto an en-US QWERTY layout.

use crate::model::Color;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Escape,
    Tab,
    Shift,
    LeftShift,
    RightShift,
    Control,
    LeftControl,
    RightControl,
    CapsLock,
    Enter,
    Backspace,
    Space,
    LeftWindows,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
    Number0,
    Number1,
    Number2,
    Number3,
    Number4,
    Number5,
    Number6,
    Number7,
    Number8,
    Number9,
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
    Q,
    R,
    S,
    T,
    U,
    V,
    W,
    X,
    Y,
    Z,
    Grave,
    Backslash,
    Comma,
    Period,
    Minus,
    Semicolon,
    Equals,
    LeftBracket,
    RightBracket,
    Quote,
    Slash,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PitchClass {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn color(self) -> Color {
        PITCH_PALETTE[self.index()].color
    }

    pub fn keys(self) -> &'static [Key] {
        PITCH_PALETTE[self.index()].keys
    }
}

pub struct PitchVisual {
    pub color: Color,
    pub keys: &'static [Key],
}

use Key::*;

pub static PITCH_PALETTE: [PitchVisual; 12] = [
    // C
    PitchVisual {
        color: Color::rgb(0xD2, 0xB4, 0x8C),
        keys: &[
            Escape, Tab, Shift, LeftShift, RightShift, Control, LeftControl, RightControl,
            CapsLock, Enter, Backspace, F11, F12, Grave, Backslash,
        ],
    },
    // C#
    PitchVisual {
        color: Color::rgb(0xFF, 0x00, 0xFF),
        keys: &[A, Q, Number1],
    },
    // D
    PitchVisual {
        color: Color::rgb(0x00, 0xFF, 0x00),
        keys: &[F1, Number2, S, X, Z, W, LeftWindows],
    },
    // D#
    PitchVisual {
        color: Color::rgb(0xFF, 0xFF, 0xFF),
        keys: &[F2, Number3, D, E],
    },
    // E
    PitchVisual {
        color: Color::rgb(0xFF, 0xFF, 0x00),
        keys: &[F, V, C, R, Number4, F3],
    },
    // F
    PitchVisual {
        color: Color::rgb(0xFF, 0xA5, 0x00),
        keys: &[G, B, T, Number5, F4, Space],
    },
    // F#
    PitchVisual {
        color: Color::rgb(0x00, 0x80, 0x00),
        keys: &[F5, Number6, Number7, Y, H],
    },
    // G
    PitchVisual {
        color: Color::rgb(0x00, 0xFF, 0xFF),
        keys: &[F6, Number8, U, J, N, M],
    },
    // G#
    PitchVisual {
        color: Color::rgb(0x80, 0x00, 0x00),
        keys: &[F7, Number9, I, K],
    },
    // A
    PitchVisual {
        color: Color::rgb(0xFF, 0x00, 0x00),
        keys: &[F8, Number0, O, L, Comma, Period],
    },
    // A#
    PitchVisual {
        color: Color::rgb(0x00, 0x00, 0xFF),
        keys: &[F9, P, Minus, Semicolon],
    },
    // B
    PitchVisual {
        color: Color::rgb(0xEE, 0x82, 0xEE),
        keys: &[F10, Equals, LeftBracket, RightBracket, Quote, Slash],
    },
];
