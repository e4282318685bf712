use crate::game::constants::material;

use super::body::BodyKind;

/// Friction and restitution for one pair of body kinds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactMaterial {
    pub friction: f64,
    pub restitution: f64,
}

impl ContactMaterial {
    pub const TANK_GROUND: ContactMaterial = ContactMaterial {
        friction: material::TANK_GROUND_FRICTION,
        restitution: material::TANK_GROUND_RESTITUTION,
    };
    pub const PROJECTILE_GROUND: ContactMaterial = ContactMaterial {
        friction: material::PROJECTILE_GROUND_FRICTION,
        restitution: material::PROJECTILE_GROUND_RESTITUTION,
    };
    pub const PROJECTILE_TANK: ContactMaterial = ContactMaterial {
        friction: material::PROJECTILE_TANK_FRICTION,
        restitution: material::PROJECTILE_TANK_RESTITUTION,
    };

    /// Material for a pair, independent of order. `None` for pairs that never interact.
    pub fn between(a: BodyKind, b: BodyKind) -> Option<ContactMaterial> {
        use BodyKind::*;
        match (a, b) {
            (Tank, Ground) | (Ground, Tank) => Some(Self::TANK_GROUND),
            (Projectile, Ground) | (Ground, Projectile) => Some(Self::PROJECTILE_GROUND),
            (Projectile, Tank) | (Tank, Projectile) => Some(Self::PROJECTILE_TANK),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_between_is_symmetric() {
        let kinds = [BodyKind::Ground, BodyKind::Tank, BodyKind::Projectile];
        for a in kinds {
            for b in kinds {
                assert_eq!(ContactMaterial::between(a, b), ContactMaterial::between(b, a));
            }
        }
    }

    #[test]
    fn test_ignored_pairs() {
        assert!(ContactMaterial::between(BodyKind::Tank, BodyKind::Tank).is_none());
        assert!(ContactMaterial::between(BodyKind::Projectile, BodyKind::Projectile).is_none());
    }

    #[test]
    fn test_tank_ground_does_not_bounce() {
        let m = ContactMaterial::between(BodyKind::Tank, BodyKind::Ground).unwrap();
        assert_eq!(m.restitution, 0.0);
        assert!(m.friction > 0.0);
    }
}
