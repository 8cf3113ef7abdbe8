/// Element quantities available to recorders.
///
/// The integer IDs are stable and used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    GlobalForce,
    LocalForce,
    BasicForce,
    LocalDisplacement,
    BasicDisplacement,
    HystereticVariables,
    BasicStiffness,
}

impl ResponseKind {
    pub const ALL: [ResponseKind; 7] = [
        ResponseKind::GlobalForce,
        ResponseKind::LocalForce,
        ResponseKind::BasicForce,
        ResponseKind::LocalDisplacement,
        ResponseKind::BasicDisplacement,
        ResponseKind::HystereticVariables,
        ResponseKind::BasicStiffness,
    ];

    pub fn id(self) -> i32 {
        match self {
            ResponseKind::GlobalForce => 1,
            ResponseKind::LocalForce => 2,
            ResponseKind::BasicForce => 3,
            ResponseKind::LocalDisplacement => 4,
            ResponseKind::BasicDisplacement => 5,
            ResponseKind::HystereticVariables => 6,
            ResponseKind::BasicStiffness => 7,
        }
    }

    pub fn from_id(id: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }

    /// Map a recorder name (`"force"`, `"localForces"`, `"basicDeformation"`,
    /// ...) to a response.
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "force" | "forces" | "globalForce" | "globalForces" => ResponseKind::GlobalForce,
            "localForce" | "localForces" => ResponseKind::LocalForce,
            "basicForce" | "basicForces" => ResponseKind::BasicForce,
            "localDisplacement" | "localDisplacements" => ResponseKind::LocalDisplacement,
            "deformation" | "deformations" | "basicDeformation" | "basicDeformations"
            | "basicDisplacement" | "basicDisplacements" => ResponseKind::BasicDisplacement,
            "hystereticParameter" | "hystVars" | "hystereticVariables" => {
                ResponseKind::HystereticVariables
            }
            "basicStiffness" => ResponseKind::BasicStiffness,
            _ => return None,
        };
        Some(kind)
    }
}
