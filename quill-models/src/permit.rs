use bitmask_enum::bitmask;

/// Capabilities a role can grant, stored as an 8-bit mask.
#[bitmask(u8)]
pub enum Permit {
    /// Follow other users
    Follow = 0x01,
    /// Comment on posts
    Comment = 0x02,
    /// Write articles
    WriteArticle = 0x04,
    /// Moderate other users' comments
    ManageComment = 0x08,
    /// Site administration, the top bit
    Admin = 0x80,
}

const NAMED: [(Permit, &str); 5] = [
    (Permit::Follow, "follow"),
    (Permit::Comment, "comment"),
    (Permit::WriteArticle, "write_article"),
    (Permit::ManageComment, "manage_comment"),
    (Permit::Admin, "admin"),
];

impl Permit {
    /// Every bit set, including the unnamed ones between `ManageComment` and
    /// `Admin`.
    pub fn administrator() -> Self {
        Self::from(0xffu8)
    }

    /// Rebuild a mask read from storage. Bits above the low byte are dropped.
    pub fn from_stored(value: i64) -> Self {
        Self::from((value & 0xff) as u8)
    }

    pub fn to_stored(self) -> i64 {
        i64::from(self.bits())
    }

    /// Checks that every bit of `required` is granted.
    ///
    /// # Example
    ///
    /// self: `0000_0111`
    /// required: `0000_0010` -> granted
    /// required: `0000_1000` -> not granted
    pub fn grants(self, required: Self) -> bool {
        self & required == required
    }

    /// Names of the named flags present in this mask.
    pub fn names(self) -> Vec<&'static str> {
        NAMED
            .iter()
            .filter(|(flag, _)| self.grants(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_values() {
        assert_eq!(Permit::Follow.bits(), 0x01);
        assert_eq!(Permit::Comment.bits(), 0x02);
        assert_eq!(Permit::WriteArticle.bits(), 0x04);
        assert_eq!(Permit::ManageComment.bits(), 0x08);
        assert_eq!(Permit::Admin.bits(), 0x80);
    }

    #[test]
    fn test_grants_requires_every_bit() {
        let user = Permit::Follow | Permit::Comment | Permit::WriteArticle;
        assert_eq!(user.bits(), 0x07);
        assert!(user.grants(Permit::Comment));
        assert!(user.grants(Permit::Follow | Permit::WriteArticle));
        assert!(!user.grants(Permit::ManageComment));
        assert!(!user.grants(Permit::Comment | Permit::ManageComment));
        assert!(!user.grants(Permit::Admin));
    }

    #[test]
    fn test_grants_matches_mask_arithmetic() {
        for mask in 0..=u8::MAX {
            for bits in [0x00u8, 0x01, 0x02, 0x04, 0x08, 0x80, 0x0f, 0x81, 0xff] {
                let expected = mask & bits == bits;
                assert_eq!(
                    Permit::from(mask).grants(Permit::from(bits)),
                    expected,
                    "mask {mask:#04x} bits {bits:#04x}"
                );
            }
        }
    }

    #[test]
    fn test_administrator_grants_everything() {
        let admin = Permit::administrator();
        for (flag, _) in NAMED {
            assert!(admin.grants(flag));
        }
        assert_eq!(admin.to_stored(), 0xff);
    }

    #[test]
    fn test_stored_round_trip() {
        let assistant =
            Permit::Follow | Permit::Comment | Permit::WriteArticle | Permit::ManageComment;
        assert_eq!(Permit::from_stored(assistant.to_stored()), assistant);
        assert_eq!(Permit::from_stored(0x1ff), Permit::administrator());
    }

    #[test]
    fn test_names() {
        let mask = Permit::Comment | Permit::Admin;
        assert_eq!(mask.names(), vec!["comment", "admin"]);
        assert!(Permit::from(0u8).names().is_empty());
    }
}
