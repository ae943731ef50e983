use group_sync_sdk::{MemberListView, MemberSummary, Membership, MembershipStatus, Viewer};

/// Project a group's member list for `viewer`.
#[must_use]
pub fn project_members(viewer: &Viewer, memberships: &[Membership]) -> MemberListView {
    let Viewer::User(user_id) = viewer else {
        return MemberListView::Hidden;
    };
    let Some(own) = memberships.iter().find(|m| m.user_id == Some(*user_id)) else {
        return MemberListView::Hidden;
    };

    match own.status {
        MembershipStatus::Pending | MembershipStatus::Rejected => MemberListView::OwnRequest {
            membership: own.clone(),
        },
        MembershipStatus::Member => MemberListView::Members {
            members: memberships
                .iter()
                .filter(|m| m.status.is_accepted())
                .map(MemberSummary::from)
                .collect(),
        },
        MembershipStatus::Admin => MemberListView::Full {
            memberships: memberships.to_vec(),
        },
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    fn membership(user_id: Option<Uuid>, status: MembershipStatus) -> Membership {
        Membership {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            group_id: Uuid::nil(),
            external_id: "x".to_owned(),
            user_id,
            name: "Name".to_owned(),
            email: "name@example.edu".to_owned(),
            status,
            reject_reason: None,
            sync_epoch: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn group_of(viewer_status: MembershipStatus, viewer: Uuid) -> Vec<Membership> {
        vec![
            membership(Some(viewer), viewer_status),
            membership(Some(Uuid::new_v4()), MembershipStatus::Admin),
            membership(Some(Uuid::new_v4()), MembershipStatus::Member),
            membership(None, MembershipStatus::Pending),
        ]
    }

    #[test]
    fn anonymous_and_outsiders_see_nothing() {
        let list = group_of(MembershipStatus::Member, Uuid::new_v4());
        assert_eq!(project_members(&Viewer::Anonymous, &list), MemberListView::Hidden);
        assert_eq!(
            project_members(&Viewer::User(Uuid::new_v4()), &list),
            MemberListView::Hidden
        );
    }

    #[test]
    fn pending_viewer_sees_only_own_request() {
        let viewer = Uuid::new_v4();
        let list = group_of(MembershipStatus::Pending, viewer);
        assert_eq!(
            project_members(&Viewer::User(viewer), &list),
            MemberListView::OwnRequest {
                membership: list[0].clone()
            }
        );
    }

    #[test]
    fn member_sees_accepted_members_without_contacts() {
        let viewer = Uuid::new_v4();
        let list = group_of(MembershipStatus::Member, viewer);
        let MemberListView::Members { members } = project_members(&Viewer::User(viewer), &list)
        else {
            panic!("expected member view");
        };
        assert_eq!(members.len(), 3);
        assert!(members.iter().all(|m| m.status.is_accepted()));
    }

    #[test]
    fn admin_sees_everything() {
        let viewer = Uuid::new_v4();
        let list = group_of(MembershipStatus::Admin, viewer);
        assert_eq!(
            project_members(&Viewer::User(viewer), &list),
            MemberListView::Full { memberships: list }
        );
    }
}
